use super::lexer::{Tok, TokenSource};

fn toks(src: &str) -> Vec<(Tok, String)> {
    let mut ts = TokenSource::new(src, "test");
    let mut out = Vec::new();
    while let Some(t) = ts.next_opt().unwrap() {
        out.push((t, ts.text().to_owned()));
    }
    out
}

#[test]
fn a_declaration_tokenizes() {
    let got = toks("(declare holds (! b bool type))");
    let kinds: Vec<Tok> = got.iter().map(|(t, _)| *t).collect();
    assert_eq!(
        kinds,
        vec![
            Tok::Open,
            Tok::Declare,
            Tok::Ident,
            Tok::Open,
            Tok::Bang,
            Tok::Ident,
            Tok::Ident,
            Tok::Type,
            Tok::Close,
            Tok::Close,
        ]
    );
    assert_eq!(got[2].1, "holds");
}

#[test]
fn comments_run_to_end_of_line() {
    let got = toks("tt ; the rest is ignored (even parens\nff");
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].1, "tt");
    assert_eq!(got[1].1, "ff");
}

#[test]
fn keywords_lose_to_longer_identifiers() {
    let got = toks("declare declare-rule declared ->x -> match matches");
    let kinds: Vec<Tok> = got.iter().map(|(t, _)| *t).collect();
    assert_eq!(
        kinds,
        vec![
            Tok::Declare,
            Tok::DeclareRule,
            Tok::Ident,
            Tok::Ident,
            Tok::Arrow,
            Tok::Match,
            Tok::Ident,
        ]
    );
}

#[test]
fn numerals_and_rationals() {
    let got = toks("42 1/2 42x");
    assert_eq!(got[0], (Tok::Natural, "42".into()));
    assert_eq!(got[1], (Tok::Rational, "1/2".into()));
    assert_eq!(got[2], (Tok::Ident, "42x".into()));
}

#[test]
fn mark_keywords_keep_their_index_text() {
    let got = toks("markvar markvar17 ifmarked3 markvarx");
    assert_eq!(got[0], (Tok::MarkVar, "markvar".into()));
    assert_eq!(got[1], (Tok::MarkVar, "markvar17".into()));
    assert_eq!(got[2], (Tok::IfMarked, "ifmarked3".into()));
    assert_eq!(got[3], (Tok::Ident, "markvarx".into()));
}

#[test]
fn two_tokens_can_be_unread() {
    let mut ts = TokenSource::new("( : x", "test");
    let a = ts.next().unwrap();
    let b = ts.next().unwrap();
    assert_eq!((a, b), (Tok::Open, Tok::Colon));
    ts.unread(b);
    ts.unread(a);
    assert_eq!(ts.next().unwrap(), Tok::Open);
    assert_eq!(ts.text(), "(");
    assert_eq!(ts.next().unwrap(), Tok::Colon);
    assert_eq!(ts.text(), ":");
    assert_eq!(ts.next().unwrap(), Tok::Ident);
    assert_eq!(ts.text(), "x");
}

#[test]
fn positions_are_one_based_lines_and_columns() {
    let mut ts = TokenSource::new("tt\n  ff", "test");
    ts.next().unwrap();
    let p = ts.position();
    assert_eq!((p.line, p.col), (1, 1));
    ts.next().unwrap();
    let p = ts.position();
    assert_eq!((p.line, p.col), (2, 3));
}
