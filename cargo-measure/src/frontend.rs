//! Syntax front-end: turns source text into a tree and replays the tree as
//! listener callbacks.
//!
//! Metric listeners only see the [`Listener`] callbacks, never `syn` types.
use crate::error::{Error, Result};
use crate::utils::has_test_attr;
use std::collections::HashMap;
use syn::punctuated::Punctuated;
use syn::{visit::Visit, Expr, File};

/// Kind of branch that adds an execution path to a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionPoint {
    If,
    While,
    For,
    Loop,
    /// Every `match` arm after the first.
    MatchArm,
    /// An `if` guard on a `match` arm.
    Guard,
    LogicalAnd,
    LogicalOr,
    /// The `?` operator, which exits early on the error path.
    Try,
}

/// What a method or function call is invoked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// `self.name(..)` or `Self::name(..)`.
    OwnType,
    /// `Type::name(..)` or a free function `name(..)`; holds the path prefix.
    Path(String),
    /// `expr.name(..)` on any other receiver.
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub receiver: Receiver,
    pub name: String,
}

impl Invocation {
    /// Key identifying the invoked method regardless of how often it is called.
    pub fn signature(&self) -> String {
        match &self.receiver {
            Receiver::OwnType => format!("Self::{}", self.name),
            Receiver::Path(prefix) if prefix.is_empty() => self.name.clone(),
            Receiver::Path(prefix) => format!("{}::{}", prefix, self.name),
            Receiver::Value => format!(".{}", self.name),
        }
    }
}

/// Callbacks fired during a pre-order walk of one unit.
///
/// Classes may be entered several times per unit (type declaration first,
/// then each `impl` block); listeners key their data by class name.
pub trait Listener {
    fn enter_class(&mut self, _name: &str) {}
    fn exit_class(&mut self, _name: &str) {}
    fn field(&mut self, _name: &str) {}
    fn enter_method(&mut self, _name: &str) {}
    fn exit_method(&mut self, _name: &str) {}
    fn decision_point(&mut self, _kind: DecisionPoint) {}
    fn invocation(&mut self, _call: &Invocation) {}
    /// A read or write of `self.<name>`.
    fn field_access(&mut self, _name: &str) {}
}

/// One compilation unit: a source file, where it came from and the module
/// it defines.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub name: String,
    pub source: String,
    /// Module path of the file within its crate, empty for the crate root.
    pub module: Vec<String>,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            module: Vec::new(),
        }
    }

    /// Place the unit at `module`, written as `a::b`.
    pub fn in_module(mut self, module: &str) -> Self {
        self.module = module
            .split("::")
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        self
    }
}

/// Builds syntax trees and walks them with a [`Listener`].
pub trait FrontEnd {
    type Tree;

    fn build_syntax_tree(&self, unit: &SourceUnit) -> Result<Self::Tree>;

    fn walk(&self, tree: &Self::Tree, listener: &mut dyn Listener);
}

/// A parsed Rust file and the module path its items live in.
#[derive(Debug, Clone)]
pub struct RustTree {
    pub module: Vec<String>,
    pub file: File,
}

/// Front-end for Rust sources backed by `syn`.
///
/// Classes are named by their module-qualified path (`config::Builder`), so
/// same-named types in different modules stay apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustFrontEnd;

impl FrontEnd for RustFrontEnd {
    type Tree = RustTree;

    fn build_syntax_tree(&self, unit: &SourceUnit) -> Result<RustTree> {
        let file =
            syn::parse_file(&unit.source).map_err(|e| Error::parse_failure(&unit.name, e))?;
        Ok(RustTree {
            module: unit.module.clone(),
            file,
        })
    }

    fn walk(&self, tree: &RustTree, listener: &mut dyn Listener) {
        if has_test_attr(&tree.file.attrs) {
            return;
        }
        let mut walker = Walker {
            listener,
            in_method: false,
            scopes: Vec::new(),
        };
        walker.enter_module(tree.module.clone(), &tree.file.items);
        walker.visit_file(&tree.file);
        walker.scopes.pop();
    }
}

/// Method name within its class; trait impl methods are qualified by the
/// trait so `Display::fmt` and `Debug::fmt` stay distinct.
pub fn bare_name(qualified: &str) -> &str {
    qualified.rsplit("::").next().unwrap_or(qualified)
}

fn last_ident(path: &syn::Path) -> Option<String> {
    path.segments.last().map(|s| s.ident.to_string())
}

fn is_self_value(expr: &Expr) -> bool {
    match expr {
        Expr::Path(p) => p.qself.is_none() && p.path.is_ident("self"),
        Expr::Paren(p) => is_self_value(&p.expr),
        Expr::Reference(r) => is_self_value(&r.expr),
        _ => false,
    }
}

fn use_bindings(
    tree: &syn::UseTree,
    prefix: &mut Vec<String>,
    out: &mut Vec<(String, Vec<String>)>,
) {
    match tree {
        syn::UseTree::Path(p) => {
            prefix.push(p.ident.to_string());
            use_bindings(&p.tree, prefix, out);
            prefix.pop();
        }
        // `use a::b::{self}` binds `b`.
        syn::UseTree::Name(n) if n.ident == "self" => {
            if let Some(last) = prefix.last() {
                out.push((last.clone(), prefix.clone()));
            }
        }
        syn::UseTree::Name(n) => {
            let mut path = prefix.clone();
            path.push(n.ident.to_string());
            out.push((n.ident.to_string(), path));
        }
        syn::UseTree::Rename(r) => {
            let mut path = prefix.clone();
            path.push(r.ident.to_string());
            out.push((r.rename.to_string(), path));
        }
        syn::UseTree::Group(g) => {
            for item in &g.items {
                use_bindings(item, prefix, out);
            }
        }
        syn::UseTree::Glob(_) => {}
    }
}

/// Names a module brings into scope with `use`, resolved against the crate.
#[derive(Debug, Default)]
struct ModuleScope {
    path: Vec<String>,
    uses: HashMap<String, Vec<String>>,
}

/// Resolve `segments` relative to `module` without consulting imports.
fn resolve_from(module: &[String], segments: &[String]) -> Vec<String> {
    match segments.first().map(String::as_str) {
        Some("crate") => segments[1..].to_vec(),
        Some("self") => {
            let mut path = module.to_vec();
            path.extend_from_slice(&segments[1..]);
            path
        }
        Some("super") => {
            let mut path = module.to_vec();
            let mut rest = segments;
            while rest.first().map(String::as_str) == Some("super") {
                path.pop();
                rest = &rest[1..];
            }
            path.extend_from_slice(rest);
            path
        }
        _ => {
            let mut path = module.to_vec();
            path.extend_from_slice(segments);
            path
        }
    }
}

struct Walker<'l> {
    listener: &'l mut dyn Listener,
    in_method: bool,
    scopes: Vec<ModuleScope>,
}

impl Walker<'_> {
    fn enter_module(&mut self, path: Vec<String>, items: &[syn::Item]) {
        let mut bindings = Vec::new();
        for item in items {
            if let syn::Item::Use(u) = item {
                use_bindings(&u.tree, &mut Vec::new(), &mut bindings);
            }
        }
        let uses = bindings
            .into_iter()
            .map(|(name, target)| {
                let resolved = resolve_from(&path, &target);
                (name, resolved)
            })
            .collect();
        self.scopes.push(ModuleScope { path, uses });
    }

    fn module(&self) -> &[String] {
        self.scopes.last().map(|s| s.path.as_slice()).unwrap_or(&[])
    }

    /// Crate-relative name of the type a path refers to.
    fn class_name(&self, segments: &[String]) -> String {
        let Some(scope) = self.scopes.last() else {
            return segments.join("::");
        };
        let imported = segments
            .split_first()
            .and_then(|(first, rest)| Some((scope.uses.get(first)?, rest)));
        let resolved = match imported {
            Some((target, rest)) => {
                let mut path = target.clone();
                path.extend_from_slice(rest);
                path
            }
            None => resolve_from(&scope.path, segments),
        };
        resolved.join("::")
    }

    fn defined_class(&self, ident: &syn::Ident) -> String {
        let mut path = self.module().to_vec();
        path.push(ident.to_string());
        path.join("::")
    }

    fn method(&mut self, name: &str, block: &syn::Block) {
        self.listener.enter_method(name);
        self.in_method = true;
        self.visit_block(block);
        self.in_method = false;
        self.listener.exit_method(name);
    }

    fn macro_args(&mut self, args: &Punctuated<Expr, syn::Token![,]>) {
        for arg in args {
            Visit::visit_expr(self, arg);
        }
    }

    fn fields(&mut self, fields: &syn::Fields) {
        for (index, field) in fields.iter().enumerate() {
            match &field.ident {
                Some(ident) => self.listener.field(&ident.to_string()),
                None => self.listener.field(&index.to_string()),
            }
        }
    }
}

impl<'ast> Visit<'ast> for Walker<'_> {
    fn visit_item(&mut self, i: &'ast syn::Item) {
        // Items nested in method bodies are not members of the class.
        if self.in_method {
            return;
        }
        syn::visit::visit_item(self, i);
    }

    fn visit_item_mod(&mut self, i: &'ast syn::ItemMod) {
        if has_test_attr(&i.attrs) {
            return;
        }
        let Some((_, items)) = &i.content else {
            return;
        };
        let mut path = self.module().to_vec();
        path.push(i.ident.to_string());
        self.enter_module(path, items);
        for item in items {
            self.visit_item(item);
        }
        self.scopes.pop();
    }

    fn visit_item_fn(&mut self, _i: &'ast syn::ItemFn) {}

    fn visit_item_struct(&mut self, i: &'ast syn::ItemStruct) {
        if has_test_attr(&i.attrs) {
            return;
        }
        let name = self.defined_class(&i.ident);
        self.listener.enter_class(&name);
        self.fields(&i.fields);
        self.listener.exit_class(&name);
    }

    fn visit_item_union(&mut self, i: &'ast syn::ItemUnion) {
        if has_test_attr(&i.attrs) {
            return;
        }
        let name = self.defined_class(&i.ident);
        self.listener.enter_class(&name);
        for field in &i.fields.named {
            if let Some(ident) = &field.ident {
                self.listener.field(&ident.to_string());
            }
        }
        self.listener.exit_class(&name);
    }

    fn visit_item_enum(&mut self, i: &'ast syn::ItemEnum) {
        if has_test_attr(&i.attrs) {
            return;
        }
        let name = self.defined_class(&i.ident);
        self.listener.enter_class(&name);
        self.listener.exit_class(&name);
    }

    fn visit_item_impl(&mut self, i: &'ast syn::ItemImpl) {
        if has_test_attr(&i.attrs) {
            return;
        }
        let syn::Type::Path(tp) = &*i.self_ty else {
            return;
        };
        if tp.qself.is_some() || tp.path.segments.is_empty() {
            return;
        }
        let segments: Vec<String> = tp
            .path
            .segments
            .iter()
            .map(|s| s.ident.to_string())
            .collect();
        let name = self.class_name(&segments);
        let qualifier = i.trait_.as_ref().and_then(|(_, path, _)| last_ident(path));
        self.listener.enter_class(&name);
        for item in &i.items {
            if let syn::ImplItem::Fn(f) = item {
                if has_test_attr(&f.attrs) {
                    continue;
                }
                let method = match &qualifier {
                    Some(q) => format!("{}::{}", q, f.sig.ident),
                    None => f.sig.ident.to_string(),
                };
                self.method(&method, &f.block);
            }
        }
        self.listener.exit_class(&name);
    }

    fn visit_item_trait(&mut self, i: &'ast syn::ItemTrait) {
        if has_test_attr(&i.attrs) {
            return;
        }
        let name = self.defined_class(&i.ident);
        self.listener.enter_class(&name);
        for item in &i.items {
            if let syn::TraitItem::Fn(f) = item {
                if let Some(block) = &f.default {
                    self.method(&f.sig.ident.to_string(), block);
                }
            }
        }
        self.listener.exit_class(&name);
    }

    fn visit_expr_if(&mut self, node: &'ast syn::ExprIf) {
        self.listener.decision_point(DecisionPoint::If);
        syn::visit::visit_expr_if(self, node);
    }

    fn visit_expr_while(&mut self, node: &'ast syn::ExprWhile) {
        self.listener.decision_point(DecisionPoint::While);
        syn::visit::visit_expr_while(self, node);
    }

    fn visit_expr_for_loop(&mut self, node: &'ast syn::ExprForLoop) {
        self.listener.decision_point(DecisionPoint::For);
        syn::visit::visit_expr_for_loop(self, node);
    }

    fn visit_expr_loop(&mut self, node: &'ast syn::ExprLoop) {
        self.listener.decision_point(DecisionPoint::Loop);
        syn::visit::visit_expr_loop(self, node);
    }

    fn visit_expr_match(&mut self, node: &'ast syn::ExprMatch) {
        for _ in node.arms.iter().skip(1) {
            self.listener.decision_point(DecisionPoint::MatchArm);
        }
        for _ in node.arms.iter().filter(|a| a.guard.is_some()) {
            self.listener.decision_point(DecisionPoint::Guard);
        }
        syn::visit::visit_expr_match(self, node);
    }

    fn visit_expr_binary(&mut self, node: &'ast syn::ExprBinary) {
        match node.op {
            syn::BinOp::And(_) => self.listener.decision_point(DecisionPoint::LogicalAnd),
            syn::BinOp::Or(_) => self.listener.decision_point(DecisionPoint::LogicalOr),
            _ => {}
        }
        syn::visit::visit_expr_binary(self, node);
    }

    fn visit_expr_try(&mut self, node: &'ast syn::ExprTry) {
        self.listener.decision_point(DecisionPoint::Try);
        syn::visit::visit_expr_try(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast syn::ExprMethodCall) {
        let receiver = if is_self_value(&node.receiver) {
            Receiver::OwnType
        } else {
            Receiver::Value
        };
        self.listener.invocation(&Invocation {
            receiver,
            name: node.method.to_string(),
        });
        syn::visit::visit_expr_method_call(self, node);
    }

    fn visit_expr_call(&mut self, node: &'ast syn::ExprCall) {
        if let Expr::Path(p) = &*node.func {
            let segments: Vec<String> = p
                .path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect();
            if let Some((name, prefix)) = segments.split_last() {
                // Tuple struct and variant constructors are not invocations.
                if !name.starts_with(char::is_uppercase) {
                    let receiver = if prefix.len() == 1 && prefix[0] == "Self" {
                        Receiver::OwnType
                    } else {
                        Receiver::Path(prefix.join("::"))
                    };
                    self.listener.invocation(&Invocation {
                        receiver,
                        name: name.clone(),
                    });
                }
            }
        }
        syn::visit::visit_expr_call(self, node);
    }

    fn visit_expr_field(&mut self, node: &'ast syn::ExprField) {
        if is_self_value(&node.base) {
            let name = match &node.member {
                syn::Member::Named(ident) => ident.to_string(),
                syn::Member::Unnamed(index) => index.index.to_string(),
            };
            self.listener.field_access(&name);
        }
        syn::visit::visit_expr_field(self, node);
    }

    fn visit_macro(&mut self, mac: &'ast syn::Macro) {
        // Bodies of `format!`, `assert!`, `vec!` and friends are plain
        // comma separated expressions; anything else stays opaque.
        if self.in_method {
            if let Ok(args) =
                mac.parse_body_with(Punctuated::<Expr, syn::Token![,]>::parse_terminated)
            {
                self.macro_args(&args);
            }
        }
        syn::visit::visit_macro(self, mac);
    }
}
