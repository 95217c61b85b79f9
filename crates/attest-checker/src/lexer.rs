//! Tokens and the pull-based token source the parsers consume.
//!
//! Keywords are reserved globally, but any "wordlike" token still exposes its
//! raw text, so contexts that expect a name (`type` as a term, say) resolve
//! by text instead of re-lexing.

use std::ops::Range;

use logos::Logos;

use crate::error::{Error, ErrorKind, Position, Result};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip(r";[^\n]*", allow_greedy = true))]
pub enum Tok {
    // commands
    #[token("declare")]
    Declare,
    #[token("define")]
    Define,
    #[token("check")]
    Check,
    #[token("program")]
    Program,
    #[token("opaque")]
    Opaque,
    #[token("run")]
    Run,
    #[token("declare-rule")]
    DeclareRule,
    #[token("define-const")]
    DefineConst,
    #[token("declare-type")]
    DeclareType,
    #[token("check-assuming")]
    CheckAssuming,

    // terms
    #[token("type")]
    Type,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("@")]
    At,
    #[token(":")]
    Colon,
    #[token("\\")]
    Backslash,
    #[token("#")]
    Pound,
    #[token("^")]
    Caret,
    #[token("_")]
    Hole,
    #[token("->")]
    Arrow,

    // side-condition code
    #[token("let")]
    Let,
    #[token("~")]
    Tilde,
    #[token("do")]
    Do,
    #[token("match")]
    Match,
    #[token("default")]
    Default,
    #[token("mpz")]
    Mpz,
    #[token("mpq")]
    Mpq,
    #[token("mp_add")]
    MpAdd,
    #[token("mp_neg")]
    MpNeg,
    #[token("mp_div")]
    MpDiv,
    #[token("mp_mul")]
    MpMul,
    #[token("mp_ifneg")]
    MpIfNeg,
    #[token("mp_ifzero")]
    MpIfZero,
    #[token("mpz_to_mpq")]
    MpzToMpq,
    #[token("compare")]
    Compare,
    #[token("ifequal")]
    IfEqual,
    #[token("fail")]
    Fail,
    #[regex(r"markvar([0-9]+)?", priority = 10)]
    MarkVar,
    #[regex(r"ifmarked([0-9]+)?", priority = 10)]
    IfMarked,

    #[token("(")]
    Open,
    #[token(")")]
    Close,

    #[regex(r"[0-9]+", priority = 10)]
    Natural,
    #[regex(r"[0-9]+/[0-9]+", priority = 10)]
    Rational,

    #[regex(r"[a-zA-Z0-9_=<>+\-*/.?@!#$&~'^|:\\%]+", priority = 0)]
    Ident,
}

impl Tok {
    /// Whether this token carries a usable name: identifiers, plus every
    /// keyword, so reserved words still resolve by text where a name is
    /// expected.
    pub fn is_wordlike(self) -> bool {
        !matches!(
            self,
            Tok::Open | Tok::Close | Tok::Natural | Tok::Rational
        )
    }
}

/// Pull-next / push-back view over the lexer, tracking the raw text and
/// span of the last token for error reporting.
///
/// Up to two tokens can be pushed back, which is the lookahead the arrow
/// sugar needs to tell `(: name T)` from a parenthesized type.
pub struct TokenSource<'a> {
    src: &'a str,
    file: String,
    lexer: logos::Lexer<'a, Tok>,
    replay: Vec<(Tok, &'a str, Range<usize>)>,
    slice: &'a str,
    span: Range<usize>,
    // text and span of the token before the current one, so `unread` can
    // roll the error position back
    prev_slice: &'a str,
    prev_span: Range<usize>,
}

impl<'a> TokenSource<'a> {
    pub fn new(src: &'a str, file: impl Into<String>) -> Self {
        TokenSource {
            src,
            file: file.into(),
            lexer: Tok::lexer(src),
            replay: Vec::new(),
            slice: "",
            span: 0..0,
            prev_slice: "",
            prev_span: 0..0,
        }
    }

    /// The next token, or `None` at end of input.
    pub fn next_opt(&mut self) -> Result<Option<Tok>> {
        if let Some((t, slice, span)) = self.replay.pop() {
            self.prev_slice = self.slice;
            self.prev_span = self.span.clone();
            self.slice = slice;
            self.span = span;
            return Ok(Some(t));
        }
        match self.lexer.next() {
            None => Ok(None),
            Some(Ok(t)) => {
                self.prev_slice = self.slice;
                self.prev_span = self.span.clone();
                self.slice = self.lexer.slice();
                self.span = self.lexer.span();
                Ok(Some(t))
            }
            Some(Err(())) => {
                self.span = self.lexer.span();
                Err(self.syntax(format!(
                    "unrecognized input {:?}",
                    self.lexer.slice()
                )))
            }
        }
    }

    /// The next token; end of input is a syntax error.
    pub fn next(&mut self) -> Result<Tok> {
        match self.next_opt()? {
            Some(t) => Ok(t),
            None => Err(self.syntax("unexpected end of file".into())),
        }
    }

    /// Push the token just read back; the following `next` returns it again
    /// with its text and span intact.
    pub fn unread(&mut self, t: Tok) {
        debug_assert!(self.replay.len() < 2, "only two tokens of lookback");
        self.replay.push((t, self.slice, self.span.clone()));
        self.slice = self.prev_slice;
        self.span = self.prev_span.clone();
    }

    /// Raw text of the last token returned.
    pub fn text(&self) -> &'a str {
        self.slice
    }

    pub fn expect(&mut self, want: Tok, context: &str) -> Result<()> {
        let got = self.next()?;
        if got != want {
            return Err(self.syntax(format!(
                "expected {want:?} {context}, found {:?}",
                self.text()
            )));
        }
        Ok(())
    }

    /// A wordlike token's text, for binder and command names.
    pub fn name(&mut self) -> Result<String> {
        let t = self.next()?;
        if !t.is_wordlike() {
            return Err(self.syntax(format!("expected an identifier, found {:?}", self.text())));
        }
        Ok(self.text().to_owned())
    }

    pub fn position(&self) -> Position {
        let upto = &self.src[..self.span.start.min(self.src.len())];
        let line = upto.bytes().filter(|b| *b == b'\n').count() as u32 + 1;
        let col = match upto.rfind('\n') {
            Some(i) => (upto.len() - i) as u32,
            None => upto.len() as u32 + 1,
        };
        Position { line, col }
    }

    fn err(&self, kind: ErrorKind) -> Error {
        Error {
            file: self.file.clone(),
            pos: self.position(),
            span: self.span.clone(),
            kind,
        }
    }

    pub fn syntax(&self, msg: String) -> Error {
        self.err(ErrorKind::Syntax(msg))
    }

    pub fn scope(&self, msg: String) -> Error {
        self.err(ErrorKind::Scope(msg))
    }

    pub fn type_err(&self, msg: String) -> Error {
        self.err(ErrorKind::Type(msg))
    }

    pub fn side_condition(&self, err: attest_vm::StaticError) -> Error {
        self.err(ErrorKind::SideCondition(err))
    }

    pub fn hole_err(&self) -> Error {
        self.err(ErrorKind::Hole)
    }
}
