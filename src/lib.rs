use std::collections::HashSet;

use indexmap::IndexMap;
use log::debug;
use swc_core::{
    common::{SyntaxContext, DUMMY_SP},
    ecma::{
        ast::*,
        visit::{VisitMut, VisitMutWith},
    },
    plugin::{plugin_transform, proxies::TransformPluginProgramMetadata},
};

// -----------------------------------------------------------------------------
// Fixed identifiers
// -----------------------------------------------------------------------------

const JEST_GLOBAL: &str = "jest";
const JEST_MOCK_METHODS: &[&str] = &["mock", "doMock"];
const REQUIRE_FN: &str = "require";
const DEFAULT_MOCKER_NAME: &str = "mockActionCreators";

// -----------------------------------------------------------------------------
// Plugin configuration
// -----------------------------------------------------------------------------

/// Options passed as JSON through the SWC plugin configuration.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginConfig {
    /// Callee name recognized as the action-creator mocking helper before any
    /// import rename is seen. Defaults to `mockActionCreators`.
    pub mocker_name: Option<String>,
}

// -----------------------------------------------------------------------------
// Call-shape helpers
// -----------------------------------------------------------------------------

/// `jest.mock(...)` or `jest.doMock(...)`.
fn is_jest_mock_call(call: &CallExpr) -> bool {
    if let Callee::Expr(callee) = &call.callee {
        if let Expr::Member(member) = &**callee {
            if let (Expr::Ident(object), MemberProp::Ident(property)) =
                (&*member.obj, &member.prop)
            {
                return object.sym.as_ref() == JEST_GLOBAL
                    && JEST_MOCK_METHODS.contains(&property.sym.as_ref());
            }
        }
    }
    false
}

/// `require(...)` with a bare-identifier callee.
fn is_require_call(call: &CallExpr) -> bool {
    if let Callee::Expr(callee) = &call.callee {
        if let Expr::Ident(ident) = &**callee {
            return ident.sym.as_ref() == REQUIRE_FN;
        }
    }
    false
}

/// The mocking helper, called either bare (`mockActionCreators(...)`) or
/// through a namespace import (`helpers.mockActionCreators(...)`).
fn is_mocker_call(call: &CallExpr, mocker_name: &str) -> bool {
    if let Callee::Expr(callee) = &call.callee {
        match &**callee {
            Expr::Ident(ident) => return ident.sym.as_ref() == mocker_name,
            Expr::Member(member) => {
                if let MemberProp::Ident(property) = &member.prop {
                    return property.sym.as_ref() == mocker_name;
                }
            }
            _ => {}
        }
    }
    false
}

/// First call argument when it is a plain string literal.
fn first_string_arg(call: &CallExpr) -> Option<String> {
    match call.args.first() {
        Some(arg) if arg.spread.is_none() => match &*arg.expr {
            Expr::Lit(Lit::Str(value)) => Some(value.value.to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// Directive-prologue statement such as `"use strict";`.
fn is_directive(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expr(expr_stmt) => matches!(&*expr_stmt.expr, Expr::Lit(Lit::Str(_))),
        _ => false,
    }
}

/// Build a `jest.mock("<source>");` statement.
fn jest_mock_stmt(source: &str) -> Stmt {
    Stmt::Expr(ExprStmt {
        span: DUMMY_SP,
        expr: Box::new(Expr::Call(CallExpr {
            span: DUMMY_SP,
            callee: Callee::Expr(Box::new(Expr::Member(MemberExpr {
                span: DUMMY_SP,
                obj: Box::new(Expr::Ident(Ident::new(
                    JEST_GLOBAL.into(),
                    DUMMY_SP,
                    SyntaxContext::empty(),
                ))),
                prop: MemberProp::Ident(IdentName::new("mock".into(), DUMMY_SP)),
            }))),
            args: vec![ExprOrSpread {
                spread: None,
                expr: Box::new(Expr::Lit(Lit::Str(Str {
                    span: DUMMY_SP,
                    value: source.into(),
                    raw: None,
                }))),
            }],
            type_args: None,
            ctxt: SyntaxContext::empty(),
        })),
    })
}

// -----------------------------------------------------------------------------
// Transform state
// -----------------------------------------------------------------------------

/// Per-file rewrite state. The entrypoint builds a fresh instance for every
/// program, so nothing leaks between files.
#[derive(Debug)]
pub struct MockActionCreatorsTransform {
    /// Callee name currently recognized as the mocking helper. Starts at
    /// `mockActionCreators` and follows renames such as
    /// `import { mockActionCreators as mac } from "jest-mock-action-creators"`.
    mocker_name: String,
    /// Local binding name -> module source it came from, covering both static
    /// imports and `require()` declarations. Iteration order is declaration
    /// order; a rebound name keeps its slot but takes the newer source.
    import_sources: IndexMap<String, String>,
    /// Module sources already covered by a `jest.mock()`/`jest.doMock()`,
    /// whether written in the source or synthesized by this run.
    mocked_sources: HashSet<String>,
    /// Sources awaiting a synthesized mock, in discovery order. Flushed into
    /// the program body once the walk is done.
    queued_sources: Vec<String>,
}

impl MockActionCreatorsTransform {
    pub fn new(config: PluginConfig) -> Self {
        Self {
            mocker_name: config
                .mocker_name
                .unwrap_or_else(|| DEFAULT_MOCKER_NAME.to_string()),
            import_sources: IndexMap::new(),
            mocked_sources: HashSet::new(),
            queued_sources: Vec::new(),
        }
    }

    fn record_binding(&mut self, local: &str, source: &str) {
        self.import_sources
            .insert(local.to_string(), source.to_string());
    }

    /// Bindings introduced by `const a = require("m")` and
    /// `const { a, b: c } = require("m")`. Defaulted, nested, computed-key and
    /// rest properties introduce none.
    fn record_require_bindings(&mut self, pattern: &Pat, source: &str) {
        match pattern {
            Pat::Ident(ident) => self.record_binding(ident.id.sym.as_ref(), source),
            Pat::Object(object) => {
                for prop in &object.props {
                    match prop {
                        // `{ a }`
                        ObjectPatProp::Assign(assign) if assign.value.is_none() => {
                            self.record_binding(assign.key.id.sym.as_ref(), source);
                        }
                        // `{ a: b }` binds `b`
                        ObjectPatProp::KeyValue(entry) => {
                            if !matches!(entry.key, PropName::Computed(_)) {
                                if let Pat::Ident(value) = &*entry.value {
                                    self.record_binding(value.id.sym.as_ref(), source);
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    /// Handle one mocking-helper call: resolve argument names to module
    /// sources and queue a `jest.mock()` for every source not yet covered.
    fn process_mocker_call(&mut self, call: &CallExpr) {
        let mut names: Vec<&str> = Vec::new();
        for arg in &call.args {
            if arg.spread.is_some() {
                continue;
            }
            // Identifiers and one-level member expressions only; `ns.actions`
            // resolves `ns`, deeper chains resolve nothing.
            let name = match &*arg.expr {
                Expr::Ident(ident) => ident.sym.as_ref(),
                Expr::Member(member) => match &*member.obj {
                    Expr::Ident(object) => object.sym.as_ref(),
                    _ => continue,
                },
                _ => continue,
            };
            let source = match self.import_sources.get(name) {
                Some(source) => source,
                None => continue,
            };
            if self.mocked_sources.contains(source) {
                continue;
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }
        if names.is_empty() {
            return;
        }

        // Sources come out in binding-table order, not argument order.
        let sources: Vec<String> = self
            .import_sources
            .iter()
            .filter(|(local, _)| names.contains(&local.as_str()))
            .map(|(_, source)| source.clone())
            .collect();
        // A module reachable through several names is mocked once; the last
        // occurrence survives, which front insertion turns into the top slot.
        let mut deduped: Vec<String> = Vec::with_capacity(sources.len());
        for (index, source) in sources.iter().enumerate() {
            if !sources[index + 1..].contains(source) {
                deduped.push(source.clone());
            }
        }

        debug!("queueing jest.mock() for {deduped:?}");
        for source in &deduped {
            self.mocked_sources.insert(source.clone());
        }
        self.queued_sources.extend(deduped);
    }
}

impl VisitMut for MockActionCreatorsTransform {
    fn visit_mut_module(&mut self, module: &mut Module) {
        module.visit_mut_children_with(self);
        // Mocks land below the directive prologue ("use strict") and above
        // everything else. Inserting one statement at a time keeps the
        // compatibility ordering: groups from later helper calls stack on top
        // of groups from earlier ones.
        let at = module
            .body
            .iter()
            .take_while(|item| match item {
                ModuleItem::Stmt(stmt) => is_directive(stmt),
                _ => false,
            })
            .count();
        for source in std::mem::take(&mut self.queued_sources) {
            module.body.insert(at, ModuleItem::Stmt(jest_mock_stmt(&source)));
        }
    }

    fn visit_mut_script(&mut self, script: &mut Script) {
        script.visit_mut_children_with(self);
        let at = script
            .body
            .iter()
            .take_while(|stmt| is_directive(stmt))
            .count();
        for source in std::mem::take(&mut self.queued_sources) {
            script.body.insert(at, jest_mock_stmt(&source));
        }
    }

    fn visit_mut_import_decl(&mut self, import: &mut ImportDecl) {
        let source = import.src.value.to_string();
        for specifier in &import.specifiers {
            if let ImportSpecifier::Named(named) = specifier {
                // The helper itself may be renamed at import time; every later
                // classification compares against the local name.
                if let Some(ModuleExportName::Ident(imported)) = &named.imported {
                    if imported.sym.as_ref() == self.mocker_name
                        && named.local.sym != imported.sym
                    {
                        debug!("mock helper renamed to `{}`", named.local.sym);
                        self.mocker_name = named.local.sym.to_string();
                    }
                }
            }
            let local = match specifier {
                ImportSpecifier::Named(named) => &named.local,
                ImportSpecifier::Default(default) => &default.local,
                ImportSpecifier::Namespace(namespace) => &namespace.local,
            };
            self.record_binding(local.sym.as_ref(), &source);
        }
        import.visit_mut_children_with(self);
    }

    fn visit_mut_var_declarator(&mut self, declarator: &mut VarDeclarator) {
        if let Some(init) = &declarator.init {
            if let Expr::Call(call) = &**init {
                if is_require_call(call) {
                    if let Some(source) = first_string_arg(call) {
                        self.record_require_bindings(&declarator.name, &source);
                    }
                }
            }
        }
        declarator.visit_mut_children_with(self);
    }

    fn visit_mut_call_expr(&mut self, call: &mut CallExpr) {
        if is_require_call(call) {
            // Bindings are picked up at the declarator; a bare `require("x")`
            // statement introduces none.
        } else if is_jest_mock_call(call) {
            if let Some(source) = first_string_arg(call) {
                self.mocked_sources.insert(source);
            }
        } else if is_mocker_call(call, &self.mocker_name) {
            self.process_mocker_call(call);
        }
        call.visit_mut_children_with(self);
    }
}

// -----------------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------------

#[plugin_transform]
pub fn process_transform(
    mut program: Program,
    metadata: TransformPluginProgramMetadata,
) -> Program {
    let config: PluginConfig = metadata
        .get_transform_plugin_config()
        .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
        .unwrap_or_default();

    let mut transform = MockActionCreatorsTransform::new(config);
    program.visit_mut_with(&mut transform);
    program
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
