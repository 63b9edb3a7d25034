//! Recursive-descent parser from tokens to [`Module`] trees.
//!
//! Statement structure follows the token stream's `Indent`/`Dedent` pairs;
//! expressions use one function per precedence level. The parser accepts
//! the statement and expression forms that occur in documentable source
//! and reports everything else as a [`ParseError`] carrying the line.

use crate::nodes::{
    Comprehension, Decorator, ExceptHandler, Expr, ImportAlias, Keyword, Module, Param,
    Parameters, Stmt, WithItem,
};
use crate::tokenizer::{tokenize, StrKind, Tok, Token};
use crate::ParseError;

/// Parses a module's source text.
pub fn parse_module(source: &str) -> Result<Module, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let body = parser.parse_statements_until_end()?;
    Ok(Module { body })
}

/// Parses a single expression, as used for string annotations.
pub fn parse_expr(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.testlist()?;
    match parser.peek() {
        Tok::Newline | Tok::EndMarker => Ok(expr),
        _ => Err(parser.unexpected("end of expression")),
    }
}

/// Names that are reserved words and therefore never plain identifiers in
/// expression position.
const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        self.tokens
            .get(self.pos)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::EndMarker)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::EndMarker)
    }

    fn line(&self) -> u32 {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn bump(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::Syntax {
            line: self.line(),
            message: format!("expected {}, found {:?}", expected, self.peek()),
        }
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if o == op)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), ParseError> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{op:?}")))
        }
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Name(n) if n == kw)
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), ParseError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{kw:?}")))
        }
    }

    fn expect_name(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Tok::Name(n) if !KEYWORDS.contains(&n.as_str()) => {
                let name = n.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn expect_newline(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            Tok::Newline => {
                self.pos += 1;
                Ok(())
            }
            Tok::EndMarker => Ok(()),
            _ => Err(self.unexpected("end of line")),
        }
    }

    // ===== statements =====

    fn parse_statements_until_end(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        while !matches!(self.peek(), Tok::EndMarker) {
            self.parse_statement(&mut body)?;
        }
        Ok(body)
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        while !matches!(self.peek(), Tok::Dedent | Tok::EndMarker) {
            self.parse_statement(&mut body)?;
        }
        if matches!(self.peek(), Tok::Dedent) {
            self.pos += 1;
        }
        Ok(body)
    }

    fn parse_statement(&mut self, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
        match self.peek() {
            Tok::Name(n) => match n.as_str() {
                "if" => {
                    let stmt = self.parse_if()?;
                    out.push(stmt);
                    Ok(())
                }
                "while" => {
                    let stmt = self.parse_while()?;
                    out.push(stmt);
                    Ok(())
                }
                "for" => {
                    let stmt = self.parse_for(false)?;
                    out.push(stmt);
                    Ok(())
                }
                "try" => {
                    let stmt = self.parse_try()?;
                    out.push(stmt);
                    Ok(())
                }
                "with" => {
                    let stmt = self.parse_with(false)?;
                    out.push(stmt);
                    Ok(())
                }
                "def" => {
                    let stmt = self.parse_def(Vec::new(), false)?;
                    out.push(stmt);
                    Ok(())
                }
                "class" => {
                    let stmt = self.parse_class(Vec::new())?;
                    out.push(stmt);
                    Ok(())
                }
                "async" => {
                    let stmt = self.parse_async()?;
                    out.push(stmt);
                    Ok(())
                }
                _ => self.parse_simple_line(out),
            },
            Tok::Op(o) if o == "@" => {
                let stmt = self.parse_decorated()?;
                out.push(stmt);
                Ok(())
            }
            Tok::Indent => Err(self.unexpected("a statement")),
            _ => self.parse_simple_line(out),
        }
    }

    /// One physical line of `;`-separated simple statements.
    fn parse_simple_line(&mut self, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
        loop {
            let stmt = self.parse_small_stmt()?;
            out.push(stmt);
            if !self.eat_op(";") {
                break;
            }
            if matches!(self.peek(), Tok::Newline | Tok::EndMarker) {
                break;
            }
        }
        self.expect_newline()
    }

    fn parse_small_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        if let Tok::Name(n) = self.peek() {
            match n.as_str() {
                "pass" => {
                    self.pos += 1;
                    return Ok(Stmt::Pass { line });
                }
                "break" => {
                    self.pos += 1;
                    return Ok(Stmt::Break { line });
                }
                "continue" => {
                    self.pos += 1;
                    return Ok(Stmt::Continue { line });
                }
                "return" => {
                    self.pos += 1;
                    let value = if matches!(self.peek(), Tok::Newline | Tok::EndMarker)
                        || self.is_op(";")
                    {
                        None
                    } else {
                        Some(self.testlist_star()?)
                    };
                    return Ok(Stmt::Return { value, line });
                }
                "raise" => {
                    self.pos += 1;
                    let mut exc = None;
                    let mut cause = None;
                    if !matches!(self.peek(), Tok::Newline | Tok::EndMarker) && !self.is_op(";") {
                        exc = Some(self.test()?);
                        if self.eat_keyword("from") {
                            cause = Some(self.test()?);
                        }
                    }
                    return Ok(Stmt::Raise { exc, cause, line });
                }
                "del" => {
                    self.pos += 1;
                    let mut targets = vec![self.or_expr()?];
                    while self.eat_op(",") {
                        targets.push(self.or_expr()?);
                    }
                    return Ok(Stmt::Delete { targets, line });
                }
                "global" | "nonlocal" => {
                    let is_global = n == "global";
                    self.pos += 1;
                    let mut names = vec![self.expect_name()?];
                    while self.eat_op(",") {
                        names.push(self.expect_name()?);
                    }
                    return Ok(if is_global {
                        Stmt::Global { names, line }
                    } else {
                        Stmt::Nonlocal { names, line }
                    });
                }
                "assert" => {
                    self.pos += 1;
                    let test = self.test()?;
                    let msg = if self.eat_op(",") {
                        Some(self.test()?)
                    } else {
                        None
                    };
                    return Ok(Stmt::Assert { test, msg, line });
                }
                "import" => return self.parse_import(line),
                "from" => return self.parse_import_from(line),
                _ => {}
            }
        }
        self.parse_expr_or_assign(line)
    }

    fn parse_expr_or_assign(&mut self, line: u32) -> Result<Stmt, ParseError> {
        let first = self.testlist_star()?;

        if self.is_op(":") && !matches!(first, Expr::Tuple(_)) {
            self.pos += 1;
            let annotation = self.test()?;
            let value = if self.eat_op("=") {
                Some(self.testlist_star()?)
            } else {
                None
            };
            return Ok(Stmt::AnnAssign {
                target: first,
                annotation,
                value,
                line,
            });
        }

        if let Tok::Op(o) = self.peek() {
            const AUG: [&str; 13] = [
                "+=", "-=", "*=", "/=", "//=", "%=", "@=", "**=", ">>=", "<<=", "&=", "|=", "^=",
            ];
            if AUG.contains(&o.as_str()) {
                let op = o.trim_end_matches('=').to_string();
                self.pos += 1;
                let value = self.testlist_star()?;
                return Ok(Stmt::AugAssign {
                    target: first,
                    op,
                    value,
                    line,
                });
            }
        }

        if self.is_op("=") {
            let mut chain = vec![first];
            while self.eat_op("=") {
                chain.push(self.testlist_star()?);
            }
            let value = chain.pop().unwrap_or(Expr::NoneLiteral);
            return Ok(Stmt::Assign {
                targets: chain,
                value,
                line,
            });
        }

        Ok(Stmt::Expr { value: first, line })
    }

    fn parse_import(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect_keyword("import")?;
        let mut names = Vec::new();
        loop {
            let name = self.parse_dotted_name()?;
            let asname = if self.eat_keyword("as") {
                Some(self.expect_name()?)
            } else {
                None
            };
            names.push(ImportAlias { name, asname });
            if !self.eat_op(",") {
                break;
            }
        }
        Ok(Stmt::Import { names, line })
    }

    fn parse_import_from(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect_keyword("from")?;
        let mut level = 0u32;
        loop {
            if self.eat_op(".") {
                level += 1;
            } else if self.is_op("...") {
                self.pos += 1;
                level += 3;
            } else {
                break;
            }
        }
        let module = if self.at_keyword("import") {
            String::new()
        } else {
            self.parse_dotted_name()?
        };
        self.expect_keyword("import")?;

        let mut names = Vec::new();
        if self.eat_op("*") {
            names.push(ImportAlias {
                name: "*".to_string(),
                asname: None,
            });
        } else {
            let parenthesized = self.eat_op("(");
            loop {
                let name = self.expect_name()?;
                let asname = if self.eat_keyword("as") {
                    Some(self.expect_name()?)
                } else {
                    None
                };
                names.push(ImportAlias { name, asname });
                if !self.eat_op(",") {
                    break;
                }
                if parenthesized && self.is_op(")") {
                    break;
                }
            }
            if parenthesized {
                self.expect_op(")")?;
            }
        }
        Ok(Stmt::ImportFrom {
            module,
            names,
            level,
            line,
        })
    }

    fn parse_dotted_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.expect_name()?;
        while self.is_op(".") && matches!(self.peek_at(1), Tok::Name(n) if !KEYWORDS.contains(&n.as_str()))
        {
            self.pos += 1;
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }

    fn parse_decorated(&mut self) -> Result<Stmt, ParseError> {
        let mut decorators = Vec::new();
        while self.is_op("@") {
            let line = self.line();
            self.pos += 1;
            let expr = self.test()?;
            self.expect_newline()?;
            decorators.push(Decorator { expr, line });
        }
        match self.peek() {
            Tok::Name(n) if n == "def" => self.parse_def(decorators, false),
            Tok::Name(n) if n == "class" => self.parse_class(decorators),
            Tok::Name(n) if n == "async" => {
                self.pos += 1;
                self.parse_def(decorators, true)
            }
            _ => Err(self.unexpected("\"def\" or \"class\" after decorators")),
        }
    }

    fn parse_async(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("async")?;
        match self.peek() {
            Tok::Name(n) if n == "def" => self.parse_def(Vec::new(), true),
            Tok::Name(n) if n == "for" => self.parse_for(true),
            Tok::Name(n) if n == "with" => self.parse_with(true),
            _ => Err(self.unexpected("\"def\", \"for\" or \"with\" after \"async\"")),
        }
    }

    fn parse_def(&mut self, decorators: Vec<Decorator>, is_async: bool) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.expect_keyword("def")?;
        let name = self.expect_name()?;
        self.expect_op("(")?;
        let params = self.parse_params()?;
        self.expect_op(")")?;
        let returns = if self.eat_op("->") {
            Some(self.test()?)
        } else {
            None
        };
        let body = self.parse_suite()?;
        Ok(Stmt::FunctionDef {
            name,
            params,
            body,
            decorators,
            returns,
            is_async,
            line,
        })
    }

    fn parse_params(&mut self) -> Result<Parameters, ParseError> {
        let mut params = Parameters::default();
        let mut seen_star = false;
        loop {
            if self.is_op(")") || self.is_op(":") {
                break;
            }
            if self.eat_op("*") {
                if let Tok::Name(n) = self.peek() {
                    if !KEYWORDS.contains(&n.as_str()) {
                        params.vararg = Some(self.parse_param()?);
                    }
                }
                seen_star = true;
            } else if self.eat_op("**") {
                params.kwarg = Some(self.parse_param()?);
            } else if self.eat_op("/") {
                // Positional-only marker; the parameters keep their order.
            } else {
                let param = self.parse_param()?;
                if seen_star {
                    params.kwonly.push(param);
                } else {
                    params.params.push(param);
                }
            }
            if !self.eat_op(",") {
                break;
            }
        }
        Ok(params)
    }

    fn parse_param(&mut self) -> Result<Param, ParseError> {
        let name = self.expect_name()?;
        let annotation = if self.eat_op(":") {
            Some(self.test()?)
        } else {
            None
        };
        let default = if self.eat_op("=") {
            Some(self.test()?)
        } else {
            None
        };
        Ok(Param {
            name,
            annotation,
            default,
        })
    }

    fn parse_class(&mut self, decorators: Vec<Decorator>) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.expect_keyword("class")?;
        let name = self.expect_name()?;
        let mut bases = Vec::new();
        let mut keywords = Vec::new();
        if self.eat_op("(") {
            while !self.is_op(")") {
                if self.eat_op("**") {
                    keywords.push(Keyword {
                        arg: None,
                        value: self.test()?,
                    });
                } else if self.eat_op("*") {
                    bases.push(Expr::Starred(Box::new(self.test()?)));
                } else if matches!(self.peek(), Tok::Name(n) if !KEYWORDS.contains(&n.as_str()))
                    && matches!(self.peek_at(1), Tok::Op(o) if o == "=")
                {
                    let arg = self.expect_name()?;
                    self.expect_op("=")?;
                    keywords.push(Keyword {
                        arg: Some(arg),
                        value: self.test()?,
                    });
                } else {
                    bases.push(self.test()?);
                }
                if !self.eat_op(",") {
                    break;
                }
            }
            self.expect_op(")")?;
        }
        let body = self.parse_suite()?;
        Ok(Stmt::ClassDef {
            name,
            bases,
            keywords,
            body,
            decorators,
            line,
        })
    }

    fn parse_suite(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect_op(":")?;
        if matches!(self.peek(), Tok::Newline) {
            self.pos += 1;
            if !matches!(self.peek(), Tok::Indent) {
                return Err(self.unexpected("an indented block"));
            }
            self.pos += 1;
            self.parse_block()
        } else {
            let mut body = Vec::new();
            self.parse_simple_line(&mut body)?;
            Ok(body)
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.expect_keyword("if")?;
        let test = self.test()?;
        let body = self.parse_suite()?;
        let orelse = self.parse_else_tail()?;
        Ok(Stmt::If {
            test,
            body,
            orelse,
            line,
        })
    }

    fn parse_else_tail(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if self.at_keyword("elif") {
            let line = self.line();
            self.pos += 1;
            let test = self.test()?;
            let body = self.parse_suite()?;
            let orelse = self.parse_else_tail()?;
            Ok(vec![Stmt::If {
                test,
                body,
                orelse,
                line,
            }])
        } else if self.eat_keyword("else") {
            self.parse_suite()
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.expect_keyword("while")?;
        let test = self.test()?;
        let body = self.parse_suite()?;
        let orelse = if self.eat_keyword("else") {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt::While {
            test,
            body,
            orelse,
            line,
        })
    }

    fn parse_for(&mut self, is_async: bool) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.expect_keyword("for")?;
        let target = self.parse_target_list()?;
        self.expect_keyword("in")?;
        let iter = self.testlist()?;
        let body = self.parse_suite()?;
        let orelse = if self.eat_keyword("else") {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt::For {
            target,
            iter,
            body,
            orelse,
            is_async,
            line,
        })
    }

    /// Assignment-target list at `or_expr` level, so `in` stays a keyword.
    fn parse_target_list(&mut self) -> Result<Expr, ParseError> {
        let mut elts = vec![self.parse_target_item()?];
        let mut tuple = false;
        while self.eat_op(",") {
            tuple = true;
            if self.at_keyword("in") || self.is_op("=") {
                break;
            }
            elts.push(self.parse_target_item()?);
        }
        if tuple {
            Ok(Expr::Tuple(elts))
        } else {
            Ok(elts.remove(0))
        }
    }

    fn parse_target_item(&mut self) -> Result<Expr, ParseError> {
        if self.eat_op("*") {
            Ok(Expr::Starred(Box::new(self.or_expr()?)))
        } else {
            self.or_expr()
        }
    }

    fn parse_with(&mut self, is_async: bool) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.expect_keyword("with")?;
        let mut items = Vec::new();
        loop {
            let context = self.test()?;
            let optional_vars = if self.eat_keyword("as") {
                Some(self.parse_target_list()?)
            } else {
                None
            };
            items.push(WithItem {
                context,
                optional_vars,
            });
            if !self.eat_op(",") {
                break;
            }
        }
        let body = self.parse_suite()?;
        Ok(Stmt::With {
            items,
            body,
            is_async,
            line,
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.expect_keyword("try")?;
        let body = self.parse_suite()?;
        let mut handlers = Vec::new();
        while self.at_keyword("except") {
            self.pos += 1;
            let mut typ = None;
            let mut name = None;
            if !self.is_op(":") {
                typ = Some(self.test()?);
                if self.eat_keyword("as") {
                    name = Some(self.expect_name()?);
                }
            }
            let handler_body = self.parse_suite()?;
            handlers.push(ExceptHandler {
                typ,
                name,
                body: handler_body,
            });
        }
        let orelse = if self.eat_keyword("else") {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        let finalbody = if self.eat_keyword("finally") {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        if handlers.is_empty() && finalbody.is_empty() {
            return Err(ParseError::Syntax {
                line,
                message: "expected \"except\" or \"finally\" block".to_string(),
            });
        }
        Ok(Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
            line,
        })
    }

    // ===== expressions =====

    /// `testlist`: one or more tests, a bare comma making a tuple.
    fn testlist(&mut self) -> Result<Expr, ParseError> {
        self.comma_list(Self::test)
    }

    /// Like `testlist` but permitting starred elements, for assignment
    /// statements and `return`.
    fn testlist_star(&mut self) -> Result<Expr, ParseError> {
        self.comma_list(|p| {
            if p.eat_op("*") {
                Ok(Expr::Starred(Box::new(p.or_expr()?)))
            } else {
                p.test()
            }
        })
    }

    fn comma_list(
        &mut self,
        mut element: impl FnMut(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let first = element(self)?;
        if !self.is_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.expr_boundary() {
                break;
            }
            elts.push(element(self)?);
        }
        Ok(Expr::Tuple(elts))
    }

    /// True when the next token cannot begin an expression element.
    fn expr_boundary(&self) -> bool {
        match self.peek() {
            Tok::Newline | Tok::EndMarker | Tok::Dedent | Tok::Indent => true,
            Tok::Op(o) => matches!(o.as_str(), "=" | ")" | "]" | "}" | ":" | ";"),
            Tok::Name(n) => matches!(n.as_str(), "in" | "if" | "else" | "for" | "as"),
            _ => false,
        }
    }

    fn test(&mut self) -> Result<Expr, ParseError> {
        if self.at_keyword("lambda") {
            return self.parse_lambda();
        }
        if self.at_keyword("yield") {
            return self.parse_yield();
        }
        let expr = self.or_test()?;
        if self.eat_keyword("if") {
            let test = self.or_test()?;
            self.expect_keyword("else")?;
            let orelse = self.test()?;
            return Ok(Expr::IfExp {
                test: Box::new(test),
                body: Box::new(expr),
                orelse: Box::new(orelse),
            });
        }
        if self.eat_op(":=") {
            let value = self.test()?;
            return Ok(Expr::BinOp {
                left: Box::new(expr),
                op: ":=".to_string(),
                right: Box::new(value),
            });
        }
        Ok(expr)
    }

    fn parse_lambda(&mut self) -> Result<Expr, ParseError> {
        self.expect_keyword("lambda")?;
        let mut params = Parameters::default();
        if !self.is_op(":") {
            params = self.parse_params()?;
        }
        self.expect_op(":")?;
        let body = self.test()?;
        Ok(Expr::Lambda {
            params: Box::new(params),
            body: Box::new(body),
        })
    }

    fn parse_yield(&mut self) -> Result<Expr, ParseError> {
        self.expect_keyword("yield")?;
        if self.eat_keyword("from") {
            return Ok(Expr::YieldFrom(Box::new(self.test()?)));
        }
        if self.expr_boundary() || self.is_op(",") {
            return Ok(Expr::Yield(None));
        }
        Ok(Expr::Yield(Some(Box::new(self.testlist()?))))
    }

    fn or_test(&mut self) -> Result<Expr, ParseError> {
        let first = self.and_test()?;
        if !self.at_keyword("or") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_keyword("or") {
            values.push(self.and_test()?);
        }
        Ok(Expr::BoolOp {
            op: "or".to_string(),
            values,
        })
    }

    fn and_test(&mut self) -> Result<Expr, ParseError> {
        let first = self.not_test()?;
        if !self.at_keyword("and") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_keyword("and") {
            values.push(self.not_test()?);
        }
        Ok(Expr::BoolOp {
            op: "and".to_string(),
            values,
        })
    }

    fn not_test(&mut self) -> Result<Expr, ParseError> {
        if self.eat_keyword("not") {
            let operand = self.not_test()?;
            return Ok(Expr::UnaryOp {
                op: "not".to_string(),
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.or_expr()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        loop {
            let op = match self.peek() {
                Tok::Op(o) if matches!(o.as_str(), "<" | ">" | "<=" | ">=" | "==" | "!=") => {
                    let op = o.clone();
                    self.pos += 1;
                    op
                }
                Tok::Name(n) if n == "in" => {
                    self.pos += 1;
                    "in".to_string()
                }
                Tok::Name(n) if n == "not" && matches!(self.peek_at(1), Tok::Name(m) if m == "in") =>
                {
                    self.pos += 2;
                    "not in".to_string()
                }
                Tok::Name(n) if n == "is" => {
                    self.pos += 1;
                    if self.eat_keyword("not") {
                        "is not".to_string()
                    } else {
                        "is".to_string()
                    }
                }
                _ => break,
            };
            ops.push(op);
            comparators.push(self.or_expr()?);
        }
        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                ops,
                comparators,
            })
        }
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        self.binop_level(0)
    }

    /// Left-associative binary operator levels, loosest first.
    fn binop_level(&mut self, level: usize) -> Result<Expr, ParseError> {
        const LEVELS: [&[&str]; 6] = [
            &["|"],
            &["^"],
            &["&"],
            &["<<", ">>"],
            &["+", "-"],
            &["*", "/", "//", "%", "@"],
        ];
        if level >= LEVELS.len() {
            return self.factor();
        }
        let mut left = self.binop_level(level + 1)?;
        loop {
            let op = match self.peek() {
                Tok::Op(o) if LEVELS[level].contains(&o.as_str()) => o.clone(),
                _ => break,
            };
            self.pos += 1;
            let right = self.binop_level(level + 1)?;
            left = Expr::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        if let Tok::Op(o) = self.peek() {
            if matches!(o.as_str(), "+" | "-" | "~") {
                let op = o.clone();
                self.pos += 1;
                let operand = self.factor()?;
                return Ok(Expr::UnaryOp {
                    op,
                    operand: Box::new(operand),
                });
            }
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = if self.eat_keyword("await") {
            Expr::Await(Box::new(self.postfix()?))
        } else {
            self.postfix()?
        };
        if self.eat_op("**") {
            let exp = self.factor()?;
            return Ok(Expr::BinOp {
                left: Box::new(base),
                op: "**".to_string(),
                right: Box::new(exp),
            });
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_op("(") {
                let (args, keywords) = self.parse_call_args()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                    keywords,
                };
            } else if self.eat_op("[") {
                let index = self.parse_subscript()?;
                self.expect_op("]")?;
                expr = Expr::Subscript {
                    value: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.is_op(".") && matches!(self.peek_at(1), Tok::Name(_)) {
                self.pos += 1;
                let attr = match self.bump() {
                    Tok::Name(n) => n,
                    _ => unreachable!("peeked a name"),
                };
                expr = Expr::Attribute {
                    value: Box::new(expr),
                    attr,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Vec<Keyword>), ParseError> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.is_op(")") {
            if self.eat_op("*") {
                args.push(Expr::Starred(Box::new(self.test()?)));
            } else if self.eat_op("**") {
                keywords.push(Keyword {
                    arg: None,
                    value: self.test()?,
                });
            } else if matches!(self.peek(), Tok::Name(n) if !KEYWORDS.contains(&n.as_str()))
                && matches!(self.peek_at(1), Tok::Op(o) if o == "=")
            {
                let arg = self.expect_name()?;
                self.expect_op("=")?;
                keywords.push(Keyword {
                    arg: Some(arg),
                    value: self.test()?,
                });
            } else {
                let value = self.test()?;
                if self.at_keyword("for") || self.at_keyword("async") {
                    let generators = self.parse_comprehension_clauses()?;
                    args.push(Expr::GeneratorExp {
                        elt: Box::new(value),
                        generators,
                    });
                } else {
                    args.push(value);
                }
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        Ok((args, keywords))
    }

    fn parse_subscript(&mut self) -> Result<Expr, ParseError> {
        let mut elts = Vec::new();
        loop {
            elts.push(self.parse_subscript_item()?);
            if !self.eat_op(",") {
                break;
            }
            if self.is_op("]") {
                return Ok(Expr::Tuple(elts));
            }
        }
        if elts.len() == 1 {
            Ok(elts.remove(0))
        } else {
            Ok(Expr::Tuple(elts))
        }
    }

    fn parse_subscript_item(&mut self) -> Result<Expr, ParseError> {
        let lower = if self.is_op(":") {
            None
        } else {
            Some(Box::new(self.test()?))
        };
        if !self.eat_op(":") {
            return match lower {
                Some(expr) => Ok(*expr),
                None => Err(self.unexpected("a subscript")),
            };
        }
        let upper = if self.is_op(":") || self.is_op("]") || self.is_op(",") {
            None
        } else {
            Some(Box::new(self.test()?))
        };
        let step = if self.eat_op(":") {
            if self.is_op("]") || self.is_op(",") {
                None
            } else {
                Some(Box::new(self.test()?))
            }
        } else {
            None
        };
        Ok(Expr::Slice { lower, upper, step })
    }

    fn parse_comprehension_clauses(&mut self) -> Result<Vec<Comprehension>, ParseError> {
        let mut generators = Vec::new();
        loop {
            let is_async = self.eat_keyword("async");
            if !self.eat_keyword("for") {
                if is_async {
                    return Err(self.unexpected("\"for\" after \"async\""));
                }
                break;
            }
            let target = self.parse_target_list()?;
            self.expect_keyword("in")?;
            let iter = self.or_test()?;
            let mut ifs = Vec::new();
            while self.eat_keyword("if") {
                ifs.push(self.or_test()?);
            }
            generators.push(Comprehension {
                target,
                iter,
                ifs,
                is_async,
            });
            if !self.at_keyword("for") && !self.at_keyword("async") {
                break;
            }
        }
        Ok(generators)
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Tok::Name(n) => match n.as_str() {
                "True" => {
                    self.pos += 1;
                    Ok(Expr::Bool(true))
                }
                "False" => {
                    self.pos += 1;
                    Ok(Expr::Bool(false))
                }
                "None" => {
                    self.pos += 1;
                    Ok(Expr::NoneLiteral)
                }
                "lambda" => self.parse_lambda(),
                _ if KEYWORDS.contains(&n.as_str()) => {
                    Err(self.unexpected("an expression"))
                }
                _ => {
                    self.pos += 1;
                    Ok(Expr::Name(n))
                }
            },
            Tok::Number(raw) => {
                self.pos += 1;
                Ok(Expr::Num(raw))
            }
            Tok::Str { .. } => self.parse_string_run(),
            Tok::Op(o) => match o.as_str() {
                "(" => self.parse_paren(),
                "[" => self.parse_list(),
                "{" => self.parse_dict_or_set(),
                "..." => {
                    self.pos += 1;
                    Ok(Expr::EllipsisLiteral)
                }
                _ => Err(self.unexpected("an expression")),
            },
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Adjacent string literals concatenate into one node.
    fn parse_string_run(&mut self) -> Result<Expr, ParseError> {
        let mut plain = String::new();
        let mut bytes = String::new();
        let mut verbatim = Vec::new();
        let mut any_f = false;
        let mut any_b = false;
        while let Tok::Str { value, kind } = self.peek() {
            match kind {
                StrKind::Plain => plain.push_str(value),
                StrKind::Bytes => {
                    any_b = true;
                    bytes.push_str(value);
                }
                StrKind::FString => {
                    any_f = true;
                    verbatim.push(value.clone());
                }
            }
            self.pos += 1;
        }
        if any_f {
            Ok(Expr::FString(verbatim.join(" ")))
        } else if any_b {
            Ok(Expr::Bytes(bytes))
        } else {
            Ok(Expr::Str(plain))
        }
    }

    fn parse_paren(&mut self) -> Result<Expr, ParseError> {
        self.expect_op("(")?;
        if self.eat_op(")") {
            return Ok(Expr::Tuple(Vec::new()));
        }
        if self.at_keyword("yield") {
            let inner = self.parse_yield()?;
            self.expect_op(")")?;
            return Ok(inner);
        }
        let first = if self.eat_op("*") {
            Expr::Starred(Box::new(self.or_expr()?))
        } else {
            self.test()?
        };
        if self.at_keyword("for") || self.at_keyword("async") {
            let generators = self.parse_comprehension_clauses()?;
            self.expect_op(")")?;
            return Ok(Expr::GeneratorExp {
                elt: Box::new(first),
                generators,
            });
        }
        if self.is_op(",") {
            let mut elts = vec![first];
            while self.eat_op(",") {
                if self.is_op(")") {
                    break;
                }
                if self.eat_op("*") {
                    elts.push(Expr::Starred(Box::new(self.or_expr()?)));
                } else {
                    elts.push(self.test()?);
                }
            }
            self.expect_op(")")?;
            return Ok(Expr::Tuple(elts));
        }
        self.expect_op(")")?;
        Ok(first)
    }

    fn parse_list(&mut self) -> Result<Expr, ParseError> {
        self.expect_op("[")?;
        if self.eat_op("]") {
            return Ok(Expr::List(Vec::new()));
        }
        let first = if self.eat_op("*") {
            Expr::Starred(Box::new(self.or_expr()?))
        } else {
            self.test()?
        };
        if self.at_keyword("for") || self.at_keyword("async") {
            let generators = self.parse_comprehension_clauses()?;
            self.expect_op("]")?;
            return Ok(Expr::ListComp {
                elt: Box::new(first),
                generators,
            });
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.is_op("]") {
                break;
            }
            if self.eat_op("*") {
                elts.push(Expr::Starred(Box::new(self.or_expr()?)));
            } else {
                elts.push(self.test()?);
            }
        }
        self.expect_op("]")?;
        Ok(Expr::List(elts))
    }

    fn parse_dict_or_set(&mut self) -> Result<Expr, ParseError> {
        self.expect_op("{")?;
        if self.eat_op("}") {
            return Ok(Expr::Dict {
                keys: Vec::new(),
                values: Vec::new(),
            });
        }
        if self.eat_op("**") {
            let mut keys = vec![None];
            let mut values = vec![self.or_expr()?];
            while self.eat_op(",") {
                if self.is_op("}") {
                    break;
                }
                if self.eat_op("**") {
                    keys.push(None);
                    values.push(self.or_expr()?);
                } else {
                    let key = self.test()?;
                    self.expect_op(":")?;
                    keys.push(Some(key));
                    values.push(self.test()?);
                }
            }
            self.expect_op("}")?;
            return Ok(Expr::Dict { keys, values });
        }
        let first = if self.eat_op("*") {
            Expr::Starred(Box::new(self.or_expr()?))
        } else {
            self.test()?
        };
        if self.eat_op(":") {
            let first_value = self.test()?;
            if self.at_keyword("for") || self.at_keyword("async") {
                let generators = self.parse_comprehension_clauses()?;
                self.expect_op("}")?;
                return Ok(Expr::DictComp {
                    key: Box::new(first),
                    value: Box::new(first_value),
                    generators,
                });
            }
            let mut keys = vec![Some(first)];
            let mut values = vec![first_value];
            while self.eat_op(",") {
                if self.is_op("}") {
                    break;
                }
                if self.eat_op("**") {
                    keys.push(None);
                    values.push(self.or_expr()?);
                } else {
                    let key = self.test()?;
                    self.expect_op(":")?;
                    keys.push(Some(key));
                    values.push(self.test()?);
                }
            }
            self.expect_op("}")?;
            return Ok(Expr::Dict { keys, values });
        }
        if self.at_keyword("for") || self.at_keyword("async") {
            let generators = self.parse_comprehension_clauses()?;
            self.expect_op("}")?;
            return Ok(Expr::SetComp {
                elt: Box::new(first),
                generators,
            });
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.is_op("}") {
                break;
            }
            elts.push(self.test()?);
        }
        self.expect_op("}")?;
        Ok(Expr::Set(elts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(source: &str) -> Vec<Stmt> {
        parse_module(source).expect("parse").body
    }

    fn expr(source: &str) -> Expr {
        parse_expr(source).expect("parse expression")
    }

    #[test]
    fn function_def_with_full_params() {
        let stmts = body("def f(a, b=3, *c, **kw):\n    pass\n");
        match &stmts[0] {
            Stmt::FunctionDef { name, params, body, is_async, .. } => {
                assert_eq!(name, "f");
                assert!(!is_async);
                assert_eq!(params.params.len(), 2);
                assert_eq!(params.params[1].name, "b");
                assert_eq!(
                    params.params[1].default.as_ref().map(|d| d.to_source()),
                    Some("3".to_string())
                );
                assert_eq!(params.vararg.as_ref().map(|p| p.name.as_str()), Some("c"));
                assert_eq!(params.kwarg.as_ref().map(|p| p.name.as_str()), Some("kw"));
                assert!(matches!(body[0], Stmt::Pass { .. }));
            }
            other => panic!("expected FunctionDef, got {other:?}"),
        }
    }

    #[test]
    fn class_def_bases_and_keywords() {
        let stmts = body("class D(X.A, C, metaclass=M):\n    pass\n");
        match &stmts[0] {
            Stmt::ClassDef { name, bases, keywords, .. } => {
                assert_eq!(name, "D");
                let rendered: Vec<String> = bases.iter().map(|b| b.to_source()).collect();
                assert_eq!(rendered, vec!["X.A", "C"]);
                assert_eq!(keywords[0].arg.as_deref(), Some("metaclass"));
            }
            other => panic!("expected ClassDef, got {other:?}"),
        }
    }

    #[test]
    fn decorators_keep_their_lines() {
        let stmts = body("@cd(A)\n@plain\nclass C:\n    pass\n");
        match &stmts[0] {
            Stmt::ClassDef { decorators, line, .. } => {
                assert_eq!(decorators.len(), 2);
                assert_eq!(decorators[0].line, 1);
                assert_eq!(decorators[0].expr.to_source(), "cd(A)");
                assert_eq!(decorators[1].line, 2);
                assert_eq!(*line, 3);
            }
            other => panic!("expected ClassDef, got {other:?}"),
        }
    }

    #[test]
    fn imports() {
        let stmts = body("import a.b as ab, c\nfrom x.y import A as B, C\nfrom . import sib\nfrom a import *\n");
        match &stmts[0] {
            Stmt::Import { names, .. } => {
                assert_eq!(names[0].name, "a.b");
                assert_eq!(names[0].asname.as_deref(), Some("ab"));
                assert_eq!(names[1].name, "c");
            }
            other => panic!("expected Import, got {other:?}"),
        }
        match &stmts[1] {
            Stmt::ImportFrom { module, names, level, .. } => {
                assert_eq!(module, "x.y");
                assert_eq!(*level, 0);
                assert_eq!(names[0].asname.as_deref(), Some("B"));
                assert_eq!(names[1].name, "C");
            }
            other => panic!("expected ImportFrom, got {other:?}"),
        }
        match &stmts[2] {
            Stmt::ImportFrom { module, level, names, .. } => {
                assert_eq!(module, "");
                assert_eq!(*level, 1);
                assert_eq!(names[0].name, "sib");
            }
            other => panic!("expected ImportFrom, got {other:?}"),
        }
        match &stmts[3] {
            Stmt::ImportFrom { names, .. } => assert_eq!(names[0].name, "*"),
            other => panic!("expected ImportFrom, got {other:?}"),
        }
    }

    #[test]
    fn assignment_forms() {
        let stmts = body("a = b = 1\nx, y = 1, 2\nz: int = 4\nw += 1\n");
        match &stmts[0] {
            Stmt::Assign { targets, value, .. } => {
                assert_eq!(targets.len(), 2);
                assert_eq!(value.to_source(), "1");
            }
            other => panic!("expected Assign, got {other:?}"),
        }
        match &stmts[1] {
            Stmt::Assign { targets, value, .. } => {
                assert!(matches!(&targets[0], Expr::Tuple(elts) if elts.len() == 2));
                assert!(matches!(value, Expr::Tuple(_)));
            }
            other => panic!("expected Assign, got {other:?}"),
        }
        match &stmts[2] {
            Stmt::AnnAssign { target, annotation, value, .. } => {
                assert_eq!(target.to_source(), "z");
                assert_eq!(annotation.to_source(), "int");
                assert!(value.is_some());
            }
            other => panic!("expected AnnAssign, got {other:?}"),
        }
        assert!(matches!(&stmts[3], Stmt::AugAssign { op, .. } if op == "+"));
    }

    #[test]
    fn docstring_statement_lines() {
        let stmts = body("'''doc'''\n\nx = 1\n");
        assert!(matches!(&stmts[0], Stmt::Expr { value: Expr::Str(s), line: 1 } if s == "doc"));
        assert_eq!(stmts[1].line(), 3);
    }

    #[test]
    fn call_arguments() {
        let e = expr("f(1, x, name='v', *rest, **extra)");
        match e {
            Expr::Call { args, keywords, .. } => {
                assert_eq!(args.len(), 3);
                assert!(matches!(&args[2], Expr::Starred(_)));
                assert_eq!(keywords.len(), 2);
                assert_eq!(keywords[0].arg.as_deref(), Some("name"));
                assert_eq!(keywords[1].arg, None);
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn comprehensions_and_containers() {
        assert!(matches!(expr("[n for n in range(10) if n % 2]"), Expr::ListComp { .. }));
        assert!(matches!(expr("{k: v for k, v in items}"), Expr::DictComp { .. }));
        assert!(matches!(expr("{2, 7, 1, 8}"), Expr::Set(elts) if elts.len() == 4));
        assert!(matches!(expr("{'a': 1, 'b': 2}"), Expr::Dict { keys, .. } if keys.len() == 2));
        assert!(matches!(expr("(x for x in y)"), Expr::GeneratorExp { .. }));
        assert!(matches!(expr("()"), Expr::Tuple(elts) if elts.is_empty()));
        assert!(matches!(expr("(1,)"), Expr::Tuple(elts) if elts.len() == 1));
    }

    #[test]
    fn compound_statements_nest() {
        let stmts = body(
            "if x:\n    a = 1\nelif y:\n    b = 2\nelse:\n    c = 3\n\nfor i in xs:\n    pass\nelse:\n    pass\n\ntry:\n    pass\nexcept ValueError as e:\n    pass\nfinally:\n    pass\n",
        );
        match &stmts[0] {
            Stmt::If { orelse, .. } => match &orelse[0] {
                Stmt::If { orelse: inner, .. } => assert_eq!(inner.len(), 1),
                other => panic!("expected nested If, got {other:?}"),
            },
            other => panic!("expected If, got {other:?}"),
        }
        assert!(matches!(&stmts[1], Stmt::For { orelse, .. } if orelse.len() == 1));
        match &stmts[2] {
            Stmt::Try { handlers, finalbody, .. } => {
                assert_eq!(handlers[0].name.as_deref(), Some("e"));
                assert_eq!(finalbody.len(), 1);
            }
            other => panic!("expected Try, got {other:?}"),
        }
    }

    #[test]
    fn ternary_and_boolean_operators() {
        assert_eq!(expr("a if b else c").to_source(), "a if b else c");
        assert_eq!(expr("x and y or not z").to_source(), "x and y or not z");
        assert_eq!(expr("a is not b").to_source(), "a is not b");
        assert_eq!(expr("a not in b").to_source(), "a not in b");
    }

    #[test]
    fn operator_precedence_round_trips() {
        assert_eq!(expr("1 + 2 * 3").to_source(), "1 + 2 * 3");
        assert_eq!(expr("(1 + 2) * 3").to_source(), "(1 + 2) * 3");
        assert_eq!(expr("-x ** 2").to_source(), "-x ** 2");
        assert_eq!(expr("a.b.c(d)[0]").to_source(), "a.b.c(d)[0]");
        assert_eq!(expr("x[1:2]").to_source(), "x[1:2]");
        assert_eq!(expr("x[a:b, c]").to_source(), "x[a:b, c]");
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(expr("'a' 'b' 'c'"), Expr::Str("abc".to_string()));
    }

    #[test]
    fn async_forms() {
        let stmts = body("async def f():\n    await g()\n");
        match &stmts[0] {
            Stmt::FunctionDef { is_async, body, .. } => {
                assert!(is_async);
                assert!(
                    matches!(&body[0], Stmt::Expr { value: Expr::Await(_), .. }),
                    "got {body:?}"
                );
            }
            other => panic!("expected FunctionDef, got {other:?}"),
        }
    }

    #[test]
    fn lambda_with_defaults() {
        assert_eq!(expr("lambda a, b=1: a + b").to_source(), "lambda a, b=1: a + b");
    }

    #[test]
    fn error_carries_line() {
        let err = parse_module("x = 1\ny = )\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 2, .. }), "{err:?}");
    }

    #[test]
    fn single_line_suites() {
        let stmts = body("class C: pass\ndef f(): return 1\nif x: a = 1; b = 2\n");
        assert!(matches!(&stmts[0], Stmt::ClassDef { body, .. } if body.len() == 1));
        assert!(matches!(&stmts[1], Stmt::FunctionDef { body, .. } if body.len() == 1));
        assert!(matches!(&stmts[2], Stmt::If { body, .. } if body.len() == 2));
    }
}
