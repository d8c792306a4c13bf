//! Parser
//!
//! Recursive descent over the token stream. Two entry points:
//!
//! - [`parse_expression`] accepts exactly one expression (the fast path)
//! - [`parse_program`] accepts a sequence of statements

use std::rc::Rc;

use super::ast::{
    BinaryOp, BoolOp, CompareOp, Expr, FStringPart, FunctionDef, Param, Stmt, Target, UnaryOp,
};
use super::error::{EvalError, EvalResult};
use super::lexer::{tokenize, Tok, Token};

/// Maximum expression nesting accepted by the parser.
const MAX_NESTING: usize = 200;

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Parse `src` as a single expression.
pub fn parse_expression(src: &str) -> EvalResult<Expr> {
    let mut parser = Parser::new(tokenize(src)?);
    parser.skip_newlines();
    let expr = parser.expression()?;
    parser.skip_newlines();
    parser.expect_eof()?;
    Ok(expr)
}

/// Parse `src` as a program of statements.
pub fn parse_program(src: &str) -> EvalResult<Vec<Stmt>> {
    let mut parser = Parser::new(tokenize(src)?);
    let mut body = Vec::new();
    parser.skip_newlines();
    while !parser.at_eof() {
        body.extend(parser.statement()?);
        parser.skip_newlines();
    }
    Ok(body)
}

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    loop_depth: usize,
    func_depth: usize,
    nesting: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            loop_depth: 0,
            func_depth: 0,
            nesting: 0,
        }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> &Tok {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.tokens
            .get(self.pos + offset)
            .or_else(|| self.tokens.last())
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> EvalError {
        EvalError::syntax(message, self.line())
    }

    fn invalid(&self) -> EvalError {
        match self.peek() {
            Tok::Eof => self.error("unexpected EOF while parsing"),
            Tok::Indent => self.error("unexpected indent"),
            _ => self.error("invalid syntax"),
        }
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Tok::Eof)
    }

    fn expect_eof(&self) -> EvalResult<()> {
        if self.at_eof() {
            Ok(())
        } else {
            Err(self.invalid())
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Tok::Newline) {
            self.pos += 1;
        }
    }

    fn check_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.check_op(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> EvalResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else if matches!(self.peek(), Tok::Eof | Tok::Newline) && op != ":" {
            Err(self.error(format!("expected '{}'", op)))
        } else if op == ":" {
            Err(self.error("expected ':'"))
        } else {
            Err(self.invalid())
        }
    }

    fn check_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Name(n) if n == kw)
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.check_kw(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, kw: &str) -> EvalResult<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.invalid())
        }
    }

    fn identifier(&mut self) -> EvalResult<String> {
        match self.peek().clone() {
            Tok::Name(name) if !is_keyword(&name) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.invalid()),
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> EvalResult<T>) -> EvalResult<T> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(self.error("too many nested parentheses"));
        }
        let result = f(self);
        self.nesting -= 1;
        result
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statement(&mut self) -> EvalResult<Vec<Stmt>> {
        if matches!(self.peek(), Tok::Indent) {
            return Err(self.error("unexpected indent"));
        }
        if matches!(self.peek(), Tok::Dedent) {
            return Err(self.error("unindent does not match any outer indentation level"));
        }

        let keyword = match self.peek() {
            Tok::Name(n) => Some(n.clone()),
            _ => None,
        };
        match keyword.as_deref() {
            Some("if") => Ok(vec![self.if_statement()?]),
            Some("while") => Ok(vec![self.while_statement()?]),
            Some("for") => Ok(vec![self.for_statement()?]),
            Some("def") => Ok(vec![self.function_def()?]),
            _ => self.simple_line(),
        }
    }

    /// Simple statements separated by `;`, ending at a newline.
    fn simple_line(&mut self) -> EvalResult<Vec<Stmt>> {
        let mut stmts = vec![self.simple_statement()?];
        while self.eat_op(";") {
            if matches!(self.peek(), Tok::Newline | Tok::Eof) {
                break;
            }
            stmts.push(self.simple_statement()?);
        }
        match self.peek() {
            Tok::Newline => {
                self.pos += 1;
                Ok(stmts)
            }
            Tok::Eof | Tok::Dedent => Ok(stmts),
            _ => Err(self.invalid()),
        }
    }

    fn simple_statement(&mut self) -> EvalResult<Stmt> {
        let keyword = match self.peek() {
            Tok::Name(n) => Some(n.clone()),
            _ => None,
        };

        match keyword.as_deref() {
            Some("pass") => {
                self.pos += 1;
                Ok(Stmt::Pass)
            }
            Some("break") => {
                if self.loop_depth == 0 {
                    return Err(self.error("'break' outside loop"));
                }
                self.pos += 1;
                Ok(Stmt::Break)
            }
            Some("continue") => {
                if self.loop_depth == 0 {
                    return Err(self.error("'continue' not properly in loop"));
                }
                self.pos += 1;
                Ok(Stmt::Continue)
            }
            Some("return") => {
                if self.func_depth == 0 {
                    return Err(self.error("'return' outside function"));
                }
                self.pos += 1;
                if self.at_statement_end() {
                    Ok(Stmt::Return(None))
                } else {
                    Ok(Stmt::Return(Some(self.expression()?)))
                }
            }
            Some("raise") => {
                self.pos += 1;
                if self.at_statement_end() {
                    return Err(self.error("bare 'raise' is not supported"));
                }
                Ok(Stmt::Raise(self.expression()?))
            }
            Some("del") => {
                self.pos += 1;
                let mut targets = vec![self.del_target()?];
                while self.eat_op(",") {
                    targets.push(self.del_target()?);
                }
                Ok(Stmt::Del(targets))
            }
            Some("global") => {
                self.pos += 1;
                let mut names = vec![self.identifier()?];
                while self.eat_op(",") {
                    names.push(self.identifier()?);
                }
                Ok(Stmt::Global(names))
            }
            _ => self.expression_statement(),
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek(), Tok::Newline | Tok::Eof | Tok::Dedent) || self.check_op(";")
    }

    fn del_target(&mut self) -> EvalResult<Target> {
        let expr = self.expression()?;
        self.to_target(expr, "delete")
    }

    fn expression_statement(&mut self) -> EvalResult<Stmt> {
        let first = self.expression()?;

        let aug = match self.peek() {
            Tok::Op("+=") => Some(BinaryOp::Add),
            Tok::Op("-=") => Some(BinaryOp::Sub),
            Tok::Op("*=") => Some(BinaryOp::Mul),
            Tok::Op("/=") => Some(BinaryOp::Div),
            Tok::Op("//=") => Some(BinaryOp::FloorDiv),
            Tok::Op("%=") => Some(BinaryOp::Mod),
            Tok::Op("**=") => Some(BinaryOp::Pow),
            _ => None,
        };
        if let Some(op) = aug {
            self.pos += 1;
            let target = self.to_target(first, "assign")?;
            let value = self.expression()?;
            return Ok(Stmt::AugAssign { target, op, value });
        }

        if !self.check_op("=") {
            return Ok(Stmt::Expr(first));
        }

        let mut exprs = vec![first];
        while self.eat_op("=") {
            exprs.push(self.expression()?);
        }
        let value = exprs.pop().unwrap_or(Expr::None);
        let targets = exprs
            .into_iter()
            .map(|e| self.to_target(e, "assign"))
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(Stmt::Assign { targets, value })
    }

    fn to_target(&self, expr: Expr, verb: &str) -> EvalResult<Target> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Index { target, index } => Ok(Target::Index {
                target: *target,
                index: *index,
            }),
            Expr::Call { .. } => Err(self.error(format!("cannot {} to function call", verb))),
            Expr::Int(_) | Expr::Float(_) | Expr::Str(_) | Expr::Bool(_) | Expr::None => {
                Err(self.error(format!("cannot {} to literal", verb)))
            }
            _ => Err(self.error(format!("cannot {} to expression", verb))),
        }
    }

    /// Body after `:`, either an indented block or statements on the same line.
    fn block(&mut self, owner: &str, owner_line: usize) -> EvalResult<Vec<Stmt>> {
        self.expect_op(":")?;
        if !matches!(self.peek(), Tok::Newline) {
            return self.simple_line();
        }
        self.pos += 1;
        self.skip_newlines();
        if !matches!(self.peek(), Tok::Indent) {
            return Err(self.error(format!(
                "expected an indented block after '{}' statement on line {}",
                owner, owner_line
            )));
        }
        self.pos += 1;

        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                Tok::Dedent => {
                    self.pos += 1;
                    break;
                }
                Tok::Eof => break,
                _ => body.extend(self.statement()?),
            }
        }
        Ok(body)
    }

    fn if_statement(&mut self) -> EvalResult<Stmt> {
        let line = self.line();
        self.expect_kw("if")?;
        let test = self.expression()?;
        let body = self.block("if", line)?;
        let mut branches = vec![(test, body)];
        let mut orelse = Vec::new();

        loop {
            let line = self.line();
            if self.eat_kw("elif") {
                let test = self.expression()?;
                let body = self.block("elif", line)?;
                branches.push((test, body));
            } else if self.eat_kw("else") {
                orelse = self.block("else", line)?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If { branches, orelse })
    }

    fn loop_body(&mut self, owner: &str, line: usize) -> EvalResult<Vec<Stmt>> {
        self.loop_depth += 1;
        let body = self.block(owner, line);
        self.loop_depth -= 1;
        body
    }

    fn while_statement(&mut self) -> EvalResult<Stmt> {
        let line = self.line();
        self.expect_kw("while")?;
        let test = self.expression()?;
        let body = self.loop_body("while", line)?;
        Ok(Stmt::While { test, body })
    }

    fn for_statement(&mut self) -> EvalResult<Stmt> {
        let line = self.line();
        self.expect_kw("for")?;
        let mut names = vec![self.identifier()?];
        while self.eat_op(",") {
            names.push(self.identifier()?);
        }
        self.expect_kw("in")?;
        let iter = self.expression()?;
        let body = self.loop_body("for", line)?;
        Ok(Stmt::For { names, iter, body })
    }

    fn function_def(&mut self) -> EvalResult<Stmt> {
        let line = self.line();
        self.expect_kw("def")?;
        let name = self.identifier()?;
        self.expect_op("(")?;

        let mut params: Vec<Param> = Vec::new();
        while !self.check_op(")") {
            let param = self.identifier()?;
            if params.iter().any(|p| p.name == param) {
                return Err(self.error(format!(
                    "duplicate argument '{}' in function definition",
                    param
                )));
            }
            let default = if self.eat_op("=") {
                Some(self.expression()?)
            } else {
                if params.iter().any(|p| p.default.is_some()) {
                    return Err(self.error("non-default argument follows default argument"));
                }
                None
            };
            params.push(Param {
                name: param,
                default,
            });
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        if self.eat_op("->") {
            self.expression()?;
        }

        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.func_depth += 1;
        let body = self.block("def", line);
        self.func_depth -= 1;
        self.loop_depth = saved_loops;

        Ok(Stmt::FunctionDef(Rc::new(FunctionDef {
            name,
            params,
            body: body?,
        })))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self) -> EvalResult<Expr> {
        self.nested(|p| {
            let body = p.or_test()?;
            if !p.eat_kw("if") {
                return Ok(body);
            }
            let test = p.or_test()?;
            p.expect_kw("else")?;
            let orelse = p.expression()?;
            Ok(Expr::Conditional {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            })
        })
    }

    fn or_test(&mut self) -> EvalResult<Expr> {
        let mut left = self.and_test()?;
        while self.eat_kw("or") {
            let right = self.and_test()?;
            left = Expr::BoolOp {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_test(&mut self) -> EvalResult<Expr> {
        let mut left = self.not_test()?;
        while self.eat_kw("and") {
            let right = self.not_test()?;
            left = Expr::BoolOp {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_test(&mut self) -> EvalResult<Expr> {
        if self.eat_kw("not") {
            let operand = self.nested(|p| p.not_test())?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek() {
            Tok::Op("==") => CompareOp::Eq,
            Tok::Op("!=") => CompareOp::NotEq,
            Tok::Op("<") => CompareOp::Lt,
            Tok::Op("<=") => CompareOp::LtE,
            Tok::Op(">") => CompareOp::Gt,
            Tok::Op(">=") => CompareOp::GtE,
            Tok::Name(n) if n == "in" => CompareOp::In,
            Tok::Name(n) if n == "not" && matches!(self.peek_at(1), Tok::Name(m) if m == "in") => {
                self.pos += 1;
                CompareOp::NotIn
            }
            Tok::Name(n) if n == "is" => {
                if matches!(self.peek_at(1), Tok::Name(m) if m == "not") {
                    self.pos += 1;
                    CompareOp::IsNot
                } else {
                    CompareOp::Is
                }
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn comparison(&mut self) -> EvalResult<Expr> {
        let left = self.arith()?;
        let mut links = Vec::new();
        while let Some(op) = self.compare_op() {
            links.push((op, self.arith()?));
        }
        if links.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                links,
            })
        }
    }

    fn arith(&mut self) -> EvalResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Op("+") => BinaryOp::Add,
                Tok::Op("-") => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> EvalResult<Expr> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Tok::Op("*") => BinaryOp::Mul,
                Tok::Op("/") => BinaryOp::Div,
                Tok::Op("//") => BinaryOp::FloorDiv,
                Tok::Op("%") => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> EvalResult<Expr> {
        let op = match self.peek() {
            Tok::Op("-") => Some(UnaryOp::Neg),
            Tok::Op("+") => Some(UnaryOp::Pos),
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                let operand = self.nested(|p| p.factor())?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            None => self.power(),
        }
    }

    fn power(&mut self) -> EvalResult<Expr> {
        let base = self.postfix()?;
        if self.eat_op("**") {
            let exponent = self.nested(|p| p.factor())?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn postfix(&mut self) -> EvalResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_op("(") {
                let (args, kwargs) = self.call_arguments()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                    kwargs,
                };
            } else if self.eat_op("[") {
                expr = self.subscript(expr)?;
            } else if self.eat_op(".") {
                let name = self.identifier()?;
                expr = Expr::Attribute {
                    target: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn call_arguments(&mut self) -> EvalResult<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while !self.check_op(")") {
            let is_keyword = matches!(self.peek(), Tok::Name(n) if !is_keyword(n))
                && matches!(self.peek_at(1), Tok::Op("="));
            if is_keyword {
                let name = self.identifier()?;
                self.pos += 1;
                if kwargs.iter().any(|(k, _)| *k == name) {
                    return Err(self.error(format!("keyword argument repeated: {}", name)));
                }
                kwargs.push((name, self.expression()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                args.push(self.expression()?);
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        Ok((args, kwargs))
    }

    fn subscript(&mut self, target: Expr) -> EvalResult<Expr> {
        let start = if self.check_op(":") {
            None
        } else {
            Some(Box::new(self.expression()?))
        };

        if !self.eat_op(":") {
            self.expect_op("]")?;
            let index = start.ok_or_else(|| self.invalid())?;
            return Ok(Expr::Index {
                target: Box::new(target),
                index,
            });
        }

        let stop = if self.check_op("]") {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        self.expect_op("]")?;
        Ok(Expr::Slice {
            target: Box::new(target),
            start,
            stop,
        })
    }

    fn atom(&mut self) -> EvalResult<Expr> {
        let line = self.line();
        match self.advance() {
            Tok::Int(v) => Ok(Expr::Int(v)),
            Tok::Float(v) => Ok(Expr::Float(v)),
            Tok::Str(mut s) => {
                while let Tok::Str(next) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Str(s))
            }
            Tok::FStr(body) => parse_fstring(&body, line),
            Tok::Name(name) => match name.as_str() {
                "True" | "true" => Ok(Expr::Bool(true)),
                "False" | "false" => Ok(Expr::Bool(false)),
                "None" | "null" => Ok(Expr::None),
                _ if is_keyword(&name) => {
                    self.pos -= 1;
                    Err(self.invalid())
                }
                _ => Ok(Expr::Name(name)),
            },
            Tok::Op("(") => self.nested(|p| {
                let inner = p.expression()?;
                if p.check_op(",") {
                    return Err(p.error("tuples are not supported; use a list"));
                }
                p.expect_op(")")?;
                Ok(inner)
            }),
            Tok::Op("[") => self.nested(|p| {
                let mut items = Vec::new();
                while !p.check_op("]") {
                    items.push(p.expression()?);
                    if !p.eat_op(",") {
                        break;
                    }
                }
                p.expect_op("]")?;
                Ok(Expr::List(items))
            }),
            Tok::Op("{") => self.nested(|p| {
                let mut entries = Vec::new();
                while !p.check_op("}") {
                    let key = p.expression()?;
                    p.expect_op(":")?;
                    let value = p.expression()?;
                    entries.push((key, value));
                    if !p.eat_op(",") {
                        break;
                    }
                }
                p.expect_op("}")?;
                Ok(Expr::Dict(entries))
            }),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.invalid())
            }
        }
    }
}

/// Split an f-string body into literal text and `{expr[!r][:spec]}` fields.
fn parse_fstring(body: &str, line: usize) -> EvalResult<Expr> {
    let chars: Vec<char> = body.chars().collect();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '}' => {
                return Err(EvalError::syntax(
                    "f-string: single '}' is not allowed",
                    line,
                ))
            }
            '{' => {
                let (field, next) = fstring_field(&chars, i + 1, line)?;
                if !literal.is_empty() {
                    parts.push(FStringPart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(field);
                i = next;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    if !literal.is_empty() {
        parts.push(FStringPart::Literal(literal));
    }
    Ok(Expr::FString(parts))
}

/// Parse one replacement field starting after `{`. Returns the part and the
/// index after the closing `}`.
fn fstring_field(chars: &[char], start: usize, line: usize) -> EvalResult<(FStringPart, usize)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut expr_end = None;
    let mut conversion_at = None;
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '}' if depth > 0 => depth -= 1,
            '!' if depth == 0 && chars.get(i + 1) != Some(&'=') && conversion_at.is_none() => {
                conversion_at = Some(i);
            }
            ':' if depth == 0 => {
                expr_end = Some(i);
                break;
            }
            '}' => {
                expr_end = Some(i);
                break;
            }
            _ => {}
        }
        i += 1;
    }

    let expr_end =
        expr_end.ok_or_else(|| EvalError::syntax("f-string: expecting '}'", line))?;
    let source_end = conversion_at.unwrap_or(expr_end);
    let source: String = chars[start..source_end].iter().collect();
    if source.trim().is_empty() {
        return Err(EvalError::syntax(
            "f-string: valid expression required before '}'",
            line,
        ));
    }

    let repr = match conversion_at {
        Some(at) => {
            let conversion: String = chars[at + 1..expr_end].iter().collect();
            match conversion.as_str() {
                "r" => true,
                "s" => false,
                _ => {
                    return Err(EvalError::syntax(
                        "f-string: invalid conversion character: expected 's' or 'r'",
                        line,
                    ))
                }
            }
        }
        None => false,
    };

    let mut end = expr_end;
    let spec = if chars[expr_end] == ':' {
        let spec_start = expr_end + 1;
        let close = chars[spec_start..]
            .iter()
            .position(|c| *c == '}')
            .map(|offset| spec_start + offset)
            .ok_or_else(|| EvalError::syntax("f-string: expecting '}'", line))?;
        end = close;
        Some(chars[spec_start..close].iter().collect())
    } else {
        None
    };

    let expr = parse_expression(source.trim())
        .map_err(|e| EvalError::syntax(format!("f-string: {}", strip_line(&e)), line))?;
    Ok((FStringPart::Field { expr, repr, spec }, end + 1))
}

fn strip_line(err: &EvalError) -> String {
    match err {
        EvalError::Syntax { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
