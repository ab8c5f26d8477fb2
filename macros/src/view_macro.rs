//! RSX view! macro: parse JSX-like syntax and generate sprig builder code.

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::{braced, Error, Expr, Ident, LitStr, Result, Token};

// ---------------------------------------------------------------------------
// AST types
// ---------------------------------------------------------------------------

/// Right-hand side of an attribute.
#[derive(Clone)]
pub(crate) enum AttrValue {
    /// `name="value"`
    Lit(LitStr),
    /// `name={expr}`
    Expr(Expr),
    /// `name` alone: a boolean attribute set to `true`.
    Flag,
}

/// A parsed RSX attribute: `name="value"`, `name={expr}`, `on:event={handler}`
/// or a bare `name`.
#[derive(Clone)]
pub(crate) struct Attribute {
    /// Hyphenated names (`data-id`) are joined back together.
    pub name: String,
    pub span: Span,
    /// `Some(event)` for `on:event`.
    pub event: Option<String>,
    pub value: AttrValue,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("event", &self.event)
            .finish()
    }
}

/// One child of an element.
#[derive(Clone)]
pub(crate) enum Node {
    Element(Element),
    /// `"literal text"`
    Text(LitStr),
    /// `{expr}`, rendered through `ToString`.
    Expr(Expr),
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Element(elem) => elem.fmt(f),
            Node::Text(lit) => f.debug_tuple("Text").field(&lit.value()).finish(),
            Node::Expr(_) => f.write_str("Expr"),
        }
    }
}

/// A parsed RSX element: `<tag attrs... />` or `<tag attrs...> children </tag>`.
#[derive(Clone)]
pub(crate) struct Element {
    pub tag: Ident,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Node>,
    pub self_closing: bool,
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag.to_string())
            .field("attrs", &self.attrs)
            .field("children", &self.children)
            .field("self_closing", &self.self_closing)
            .finish()
    }
}

/// The top-level view! input: a sequence of nodes.
#[derive(Debug)]
struct ViewInput {
    nodes: Vec<Node>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl Parse for ViewInput {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut nodes = Vec::new();
        while !input.is_empty() {
            nodes.push(parse_node(input)?);
        }
        Ok(ViewInput { nodes })
    }
}

/// Parse one element, text literal, or braced expression.
pub(crate) fn parse_node(input: ParseStream) -> Result<Node> {
    if input.peek(Token![<]) {
        return parse_element(input).map(Node::Element);
    }
    if input.peek(LitStr) {
        return input.parse().map(Node::Text);
    }
    if input.peek(syn::token::Brace) {
        let content;
        braced!(content in input);
        return content.parse().map(Node::Expr);
    }
    Err(input.error("expected an element, a string literal, or `{expr}`"))
}

/// Parse an attribute name, joining `-`-separated parts (`aria-label`).
/// Keywords are accepted, so `type` and `for` work.
fn parse_attr_name(input: ParseStream) -> Result<(String, Span)> {
    let first = Ident::parse_any(input)?;
    let span = first.span();
    let mut name = first.to_string();
    while input.peek(Token![-]) {
        input.parse::<Token![-]>()?;
        let part = Ident::parse_any(input)?;
        name.push('-');
        name.push_str(&part.to_string());
    }
    Ok((name, span))
}

fn parse_attribute(input: ParseStream) -> Result<Attribute> {
    let (name, span) = parse_attr_name(input)?;
    let mut event = None;
    if name == "on" && input.peek(Token![:]) {
        input.parse::<Token![:]>()?;
        let (event_name, _) = parse_attr_name(input)?;
        event = Some(event_name);
    }

    if !input.peek(Token![=]) {
        if event.is_some() {
            return Err(Error::new(span, "event attributes need a handler: `on:event={handler}`"));
        }
        return Ok(Attribute {
            name,
            span,
            event,
            value: AttrValue::Flag,
        });
    }
    input.parse::<Token![=]>()?;
    let value = if input.peek(LitStr) {
        AttrValue::Lit(input.parse()?)
    } else if input.peek(syn::token::Brace) {
        let content;
        braced!(content in input);
        AttrValue::Expr(content.parse()?)
    } else {
        return Err(input.error("expected a string literal or `{expr}` attribute value"));
    };
    if event.is_some() && !matches!(value, AttrValue::Expr(_)) {
        return Err(Error::new(span, "event handlers must be expressions: `on:event={handler}`"));
    }
    Ok(Attribute {
        name,
        span,
        event,
        value,
    })
}

/// Parse a single RSX element from the token stream.
pub(crate) fn parse_element(input: ParseStream) -> Result<Element> {
    // Expect `<`
    input.parse::<Token![<]>()?;

    // Parse tag name
    let tag = Ident::parse_any(input)?;

    // Parse attributes until we hit `/>` or `>`
    let mut attrs = Vec::new();
    loop {
        // Check for self-closing `/>`.
        if input.peek(Token![/]) {
            input.parse::<Token![/]>()?;
            input.parse::<Token![>]>()?;
            return Ok(Element {
                tag,
                attrs,
                children: Vec::new(),
                self_closing: true,
            });
        }

        // Check for open tag close `>`.
        if input.peek(Token![>]) {
            input.parse::<Token![>]>()?;
            break;
        }

        attrs.push(parse_attribute(input)?);
    }

    // Parse children until closing tag `</tag>`.
    let mut children = Vec::new();
    loop {
        if input.is_empty() {
            return Err(Error::new(tag.span(), format!("unclosed element `<{tag}>`")));
        }

        // Check for closing tag: `</`
        if input.peek(Token![<]) && input.peek2(Token![/]) {
            input.parse::<Token![<]>()?;
            input.parse::<Token![/]>()?;
            let closing_tag = Ident::parse_any(input)?;
            if closing_tag != tag {
                return Err(Error::new(
                    closing_tag.span(),
                    format!(
                        "mismatched closing tag: expected `</{}>`, found `</{}>`",
                        tag, closing_tag
                    ),
                ));
            }
            input.parse::<Token![>]>()?;
            break;
        }

        children.push(parse_node(input)?);
    }

    Ok(Element {
        tag,
        attrs,
        children,
        self_closing: false,
    })
}

// ---------------------------------------------------------------------------
// Code generation
// ---------------------------------------------------------------------------

/// Code generator state.
///
/// Every expression in the view is evaluated once per build at the top of the
/// outer builder, into a local. Element builders are `Fn` closures that may
/// run again on refresh, so each one captures clones of the locals its
/// subtree uses and clones them again per request.
#[derive(Default)]
struct Codegen {
    /// `let` statements evaluating expressions, in document order.
    locals: Vec<TokenStream>,
    next: usize,
}

impl Codegen {
    fn local(&mut self, prefix: &str) -> Ident {
        let ident = Ident::new(&format!("__{prefix}_{}", self.next), Span::mixed_site());
        self.next += 1;
        ident
    }

    /// Statements for one attribute, plus the locals they read.
    fn attribute(&mut self, attr: &Attribute) -> (TokenStream, Vec<Ident>) {
        if let Some(event) = &attr.event {
            let handler = match &attr.value {
                AttrValue::Expr(expr) => expr,
                // Rejected while parsing.
                _ => return (Error::new(attr.span, "invalid event handler").to_compile_error(), Vec::new()),
            };
            let local = self.local("on");
            self.locals.push(quote! {
                let #local: ::sprig::event::Handler = ::sprig::event::handler(#handler);
            });
            let code = quote! {
                __scope.listen(#event, ::std::clone::Clone::clone(&#local))?;
            };
            return (code, vec![local]);
        }
        let name = &attr.name;
        match &attr.value {
            AttrValue::Lit(lit) => (quote! { __scope.attr(#name, #lit)?; }, Vec::new()),
            AttrValue::Flag => (quote! { __scope.attr(#name, true)?; }, Vec::new()),
            AttrValue::Expr(expr) => {
                let local = self.local("attr");
                self.locals.push(quote! {
                    let #local: ::sprig::dom::AttrValue =
                        ::core::convert::Into::into(::std::clone::Clone::clone(&(#expr)));
                });
                let code = quote! {
                    __scope.attr(#name, ::std::clone::Clone::clone(&#local))?;
                };
                (code, vec![local])
            }
        }
    }

    /// Statements for one node, plus the locals they read.
    fn node(&mut self, node: &Node) -> (TokenStream, Vec<Ident>) {
        match node {
            Node::Text(lit) => (quote! { __scope.text(#lit)?; }, Vec::new()),
            Node::Expr(expr) => {
                let local = self.local("text");
                self.locals.push(quote! {
                    let #local: ::std::string::String = ::std::string::ToString::to_string(&(#expr));
                });
                let code = quote! {
                    __scope.text(::std::clone::Clone::clone(&#local))?;
                };
                (code, vec![local])
            }
            Node::Element(elem) => self.element(elem),
        }
    }

    fn element(&mut self, elem: &Element) -> (TokenStream, Vec<Ident>) {
        let tag = elem.tag.to_string();
        let mut used = Vec::new();
        let mut body = Vec::new();
        for attr in &elem.attrs {
            let (code, locals) = self.attribute(attr);
            body.push(code);
            used.extend(locals);
        }
        for child in &elem.children {
            let (code, locals) = self.node(child);
            body.push(code);
            used.extend(locals);
        }
        let code = quote! {
            __scope.element(#tag, {
                #(let #used = ::std::clone::Clone::clone(&#used);)*
                move |__scope: &mut ::sprig::scope::Scope<'_>| {
                    #(#body)*
                    ::core::result::Result::Ok(())
                }
            })?;
        };
        (code, used)
    }
}

/// Entry point: generate code for the entire view! macro.
pub(crate) fn view_impl(input: TokenStream) -> Result<TokenStream> {
    let parsed: ViewInput = syn::parse2(input)?;

    if parsed.nodes.is_empty() {
        return Err(Error::new(
            Span::call_site(),
            "view! macro requires at least one node",
        ));
    }

    let mut codegen = Codegen::default();
    let statements: Vec<TokenStream> = parsed.nodes.iter().map(|n| codegen.node(n).0).collect();
    let locals = codegen.locals;

    Ok(quote! {
        ::sprig::request::builder(move |__scope: &mut ::sprig::scope::Scope<'_>| {
            #(#locals)*
            #(#statements)*
            ::core::result::Result::<(), ::sprig::error::RenderError>::Ok(())
        })
    })
}

// ===========================================================================
// Tests
// ===========================================================================
