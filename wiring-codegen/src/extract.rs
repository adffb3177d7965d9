//! Dependency reference extraction.
//!
//! Names come from three places: `#[depends_on(..)]` and typed-factory
//! dependency lists (taken verbatim), factory-closure parameter names, and a
//! syntactic scan of every other expression. The scan accepts bare
//! identifiers and `self.name` accesses whose first character is lowercase or
//! `_` and which are not keywords. It knows nothing about types, so it
//! over-approximates; callers intersect the result with known members.
//!
//! Macro arguments are scanned too. Bodies that parse as comma-separated
//! expressions (`format!`, `vec![..]`, `assert!`) are walked like any other
//! expression, named format arguments contributing only their value. Other
//! bodies fall back to a token scan that skips identifiers following `.` or
//! `::` and identifiers heading a path or a nested macro call.

use proc_macro2::{Delimiter, Ident, TokenStream, TokenTree};
use syn::punctuated::Punctuated;
use syn::visit::{self, Visit};
use syn::{Expr, ExprField, ExprPath, Macro, Member, Token};

use crate::model::{ConstructionRule, Provider};

const KEYWORDS: &[&str] = &[
    "_", "abstract", "as", "async", "await", "become", "box", "break", "const", "continue",
    "crate", "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if",
    "impl", "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv",
    "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "union", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Dependency names referenced by one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    /// Annotated names and closure parameters, in declaration order.
    pub explicit: Vec<String>,
    /// Names found by scanning expressions, in discovery order.
    pub scanned: Vec<String>,
}

impl References {
    /// Explicit names followed by scanned ones, without duplicates.
    pub fn graph_candidates(&self) -> Vec<String> {
        let mut names = self.explicit.clone();
        for name in &self.scanned {
            push_unique(&mut names, name);
        }
        names
    }
}

/// Collects the dependency references of a provider across all its rules.
pub fn references(provider: &Provider) -> References {
    let mut refs = References::default();
    for name in &provider.depends_on {
        push_unique(&mut refs.explicit, &name.to_string());
    }
    for rule in provider.rules() {
        match rule {
            ConstructionRule::Typed(typed) => {
                for name in &typed.deps {
                    push_unique(&mut refs.explicit, &name.to_string());
                }
            }
            ConstructionRule::Closure(closure) => {
                for name in closure.param_names() {
                    push_unique(&mut refs.explicit, &name.to_string());
                }
            }
            ConstructionRule::Expression(expr) | ConstructionRule::Initializer(expr) => {
                for name in scan_expr(expr) {
                    push_unique(&mut refs.scanned, &name);
                }
            }
        }
    }
    refs
}

/// Candidate identifiers referenced by an expression.
pub fn scan_expr(expr: &Expr) -> Vec<String> {
    let mut scanner = Scanner::default();
    scanner.visit_expr(expr);
    scanner.names
}

/// Whether a token could name a member.
pub fn is_candidate(token: &str) -> bool {
    let Some(first) = token.chars().next() else {
        return false;
    };
    (first.is_lowercase() || first == '_') && !KEYWORDS.contains(&token)
}

#[derive(Default)]
struct Scanner {
    names: Vec<String>,
}

impl Scanner {
    fn push(&mut self, token: String) {
        if is_candidate(&token) {
            push_unique(&mut self.names, &token);
        }
    }

    fn scan_tokens(&mut self, tokens: TokenStream) {
        let tokens: Vec<TokenTree> = tokens.into_iter().collect();
        for (index, token) in tokens.iter().enumerate() {
            match token {
                TokenTree::Group(group) => self.scan_tokens(group.stream()),
                TokenTree::Ident(ident) => {
                    let before = &tokens[..index];
                    if ident == "self" {
                        if let Some(field) = self_field(&tokens[index..]) {
                            self.push(field.to_string());
                        }
                    } else if !follows_access(before) && !heads_path(tokens.get(index + 1)) {
                        self.push(ident.to_string());
                    }
                }
                _ => {}
            }
        }
    }
}

impl<'ast> Visit<'ast> for Scanner {
    fn visit_expr_path(&mut self, node: &'ast ExprPath) {
        if node.qself.is_none()
            && let Some(ident) = node.path.get_ident()
        {
            self.push(ident.to_string());
        }
        visit::visit_expr_path(self, node);
    }

    fn visit_expr_field(&mut self, node: &'ast ExprField) {
        if is_self(&node.base)
            && let Member::Named(ident) = &node.member
        {
            self.push(ident.to_string());
        }
        visit::visit_expr_field(self, node);
    }

    fn visit_macro(&mut self, node: &'ast Macro) {
        match node.parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated) {
            Ok(args) => {
                for arg in &args {
                    let value = match arg {
                        Expr::Assign(assign) => &*assign.right,
                        _ => arg,
                    };
                    for name in scan_expr(value) {
                        self.push(name);
                    }
                }
            }
            Err(_) => self.scan_tokens(node.tokens.clone()),
        }
    }
}

/// Field name of a `self.name` token run that is not a method call.
pub(crate) fn self_field(tokens: &[TokenTree]) -> Option<&Ident> {
    match tokens {
        [TokenTree::Ident(receiver), TokenTree::Punct(dot), TokenTree::Ident(field), rest @ ..]
            if receiver == "self" && dot.as_char() == '.' =>
        {
            match rest.first() {
                Some(TokenTree::Group(g)) if g.delimiter() == Delimiter::Parenthesis => None,
                Some(TokenTree::Punct(p)) if p.as_char() == ':' => None,
                _ => Some(field),
            }
        }
        _ => None,
    }
}

fn is_punct(token: Option<&TokenTree>, ch: char) -> bool {
    matches!(token, Some(TokenTree::Punct(p)) if p.as_char() == ch)
}

fn follows_access(before: &[TokenTree]) -> bool {
    match before {
        [.., sep, colon] if is_punct(Some(colon), ':') => is_punct(Some(sep), ':'),
        [.., dot] => is_punct(Some(dot), '.'),
        _ => false,
    }
}

fn heads_path(next: Option<&TokenTree>) -> bool {
    is_punct(next, ':') || is_punct(next, '!')
}

pub(crate) fn is_self(expr: &Expr) -> bool {
    matches!(expr, Expr::Path(path) if path.qself.is_none() && path.path.is_ident("self"))
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|v| v == name) {
        names.push(name.to_owned());
    }
}
