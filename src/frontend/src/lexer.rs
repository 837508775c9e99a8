use {
    chumsky::prelude::{Parser as ChumskyParser, *},
    derive_more::Display,
};

pub(super) trait Parser<'src, Output>:
    ChumskyParser<'src, &'src str, Output, extra::Err<Rich<'src, char>>> + Clone
{
}
impl<
        'src,
        Output,
        T: ChumskyParser<'src, &'src str, Output, extra::Err<Rich<'src, char>>> + Clone,
    > Parser<'src, Output> for T
{
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub enum Token<'src> {
    // delimiters
    #[display("{{")]
    OpenBrace,
    #[display("}}")]
    CloseBrace,
    #[display("(")]
    OpenParen,
    #[display(")")]
    CloseParen,
    #[display(",")]
    Comma,
    #[display(":")]
    Colon,
    // operators
    #[display(":=")]
    ColonEq,
    #[display("->")]
    ThinArrow,
    // keywords
    #[display("function")]
    Function,
    #[display("let")]
    Let,
    #[display("if")]
    If,
    #[display("switch")]
    Switch,
    #[display("case")]
    Case,
    #[display("default")]
    Default,
    #[display("for")]
    For,
    #[display("break")]
    Break,
    #[display("continue")]
    Continue,
    #[display("leave")]
    Leave,
    // literals
    #[display("true")]
    True,
    #[display("false")]
    False,
    Int(&'src str),
    #[display("0x{_0}")]
    Hex(&'src str),
    #[display("\"{_0}\"")]
    Str(&'src str),
    // identifiers
    Ident(&'src str),
}

fn delimiter_lexer<'src>() -> impl Parser<'src, Token<'src>> {
    choice([
        just("{").to(Token::OpenBrace),
        just("}").to(Token::CloseBrace),
        just("(").to(Token::OpenParen),
        just(")").to(Token::CloseParen),
        just(",").to(Token::Comma),
        just(":=").to(Token::ColonEq),
        just(":").to(Token::Colon),
        just("->").to(Token::ThinArrow),
    ])
}

fn char_escape_lexer<'src>() -> impl Parser<'src, char> {
    just('\\').ignore_then(choice([
        just('n').to('\n'),
        just('r').to('\r'),
        just('t').to('\t'),
        just('\\').to('\\'),
        just('"').to('"'),
        just('\'').to('\''),
        just('0').to('\0'),
    ]))
}

fn string_literal_lexer<'src>() -> impl Parser<'src, Token<'src>> {
    none_of("\"\\")
        .or(char_escape_lexer())
        .repeated()
        .to_slice()
        .delimited_by(just('"'), just('"'))
        .map(Token::Str)
}

fn hex_literal_lexer<'src>() -> impl Parser<'src, Token<'src>> {
    just("0x")
        .ignore_then(
            any()
                .filter(|c: &char| c.is_ascii_hexdigit())
                .repeated()
                .at_least(1)
                .to_slice(),
        )
        .map(Token::Hex)
}

fn int_literal_lexer<'src>() -> impl Parser<'src, Token<'src>> {
    text::int(10).map(Token::Int)
}

fn ident_lexer<'src>() -> impl Parser<'src, Token<'src>> {
    any()
        .filter(|c: &char| c.is_ascii_alphabetic() || matches!(c, '_' | '$'))
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
                .repeated(),
        )
        .to_slice()
        .map(|ident| match ident {
            "function" => Token::Function,
            "let" => Token::Let,
            "if" => Token::If,
            "switch" => Token::Switch,
            "case" => Token::Case,
            "default" => Token::Default,
            "for" => Token::For,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "leave" => Token::Leave,
            "true" => Token::True,
            "false" => Token::False,
            _ => Token::Ident(ident),
        })
}

fn token_lexer<'src>() -> impl Parser<'src, Token<'src>> {
    choice((
        delimiter_lexer(),
        string_literal_lexer(),
        hex_literal_lexer(),
        int_literal_lexer(),
        ident_lexer(),
    ))
}

fn comment_lexer<'src>() -> impl Parser<'src, ()> {
    let line = just("//").then(none_of('\n').repeated()).ignored();
    let block = just("/*")
        .then(any().and_is(just("*/").not()).repeated())
        .then(just("*/"))
        .ignored();
    line.or(block).padded()
}

pub(super) fn lexer<'src>() -> impl Parser<'src, Vec<Token<'src>>> {
    token_lexer()
        .padded_by(comment_lexer().repeated())
        .padded()
        .repeated()
        .collect()
        .then_ignore(comment_lexer().repeated())
        .then_ignore(end())
}

/// Resolves the escapes of a lexed string literal body into its bytes.
pub(super) fn unescape(body: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        let c = match c {
            '\\' => match chars.next() {
                Some('n') => '\n',
                Some('r') => '\r',
                Some('t') => '\t',
                Some('0') => '\0',
                Some(c) => c,
                None => break,
            },
            c => c,
        };
        let mut buf = [0; 4];
        bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }
    bytes
}
