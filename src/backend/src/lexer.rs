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
    #[display(".")]
    Dot,
    #[display("%")]
    Percent,
    #[display("@")]
    At,
    // operators
    #[display("==")]
    EqEq,
    #[display("!=")]
    NotEq,
    #[display("=")]
    Eq,
    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("*")]
    Star,
    #[display("->")]
    ThinArrow,
    // keywords
    #[display("func")]
    Func,
    #[display("end")]
    End,
    #[display("return")]
    Return,
    #[display("let")]
    Let,
    #[display("local")]
    Local,
    #[display("alloc_locals")]
    AllocLocals,
    #[display("assert")]
    Assert,
    #[display("if")]
    If,
    #[display("else")]
    Else,
    #[display("with")]
    With,
    #[display("from")]
    From,
    #[display("import")]
    Import,
    // literals
    Int(&'src str),
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
        just(":").to(Token::Colon),
        just(".").to(Token::Dot),
        just("%").to(Token::Percent),
        just("@").to(Token::At),
    ])
}

fn operator_lexer<'src>() -> impl Parser<'src, Token<'src>> {
    choice([
        just("==").to(Token::EqEq),
        just("!=").to(Token::NotEq),
        just("=").to(Token::Eq),
        just("+").to(Token::Plus),
        just("->").to(Token::ThinArrow),
        just("-").to(Token::Minus),
        just("*").to(Token::Star),
    ])
}

fn int_literal_lexer<'src>() -> impl Parser<'src, Token<'src>> {
    text::int(10).map(Token::Int)
}

fn ident_lexer<'src>() -> impl Parser<'src, Token<'src>> {
    text::ascii::ident().map(|ident| match ident {
        "func" => Token::Func,
        "end" => Token::End,
        "return" => Token::Return,
        "let" => Token::Let,
        "local" => Token::Local,
        "alloc_locals" => Token::AllocLocals,
        "assert" => Token::Assert,
        "if" => Token::If,
        "else" => Token::Else,
        "with" => Token::With,
        "from" => Token::From,
        "import" => Token::Import,
        _ => Token::Ident(ident),
    })
}

fn token_lexer<'src>() -> impl Parser<'src, Token<'src>> {
    choice((
        delimiter_lexer(),
        operator_lexer(),
        int_literal_lexer(),
        ident_lexer(),
    ))
}

fn comment_lexer<'src>() -> impl Parser<'src, ()> {
    just('#').then(none_of('\n').repeated()).ignored().padded()
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
