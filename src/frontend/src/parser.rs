use {
    super::{
        ast::*,
        left_aligned_word,
        lexer::{self, Token},
    },
    chumsky::prelude::{Parser as ChumskyParser, *},
    num_bigint::BigUint,
};

pub(super) trait Parser<'tokens, 'src: 'tokens, Output>:
    ChumskyParser<'tokens, &'tokens [Token<'src>], Output, extra::Err<Rich<'tokens, Token<'src>>>>
    + Clone
    + 'tokens
{
}
impl<
        'tokens,
        'src: 'tokens,
        Output,
        T: ChumskyParser<
                'tokens,
                &'tokens [Token<'src>],
                Output,
                extra::Err<Rich<'tokens, Token<'src>>>,
            > + Clone
            + 'tokens,
    > Parser<'tokens, 'src, Output> for T
{
}

fn ident_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Ident> {
    select! { Token::Ident(ident) => ident.to_owned() }
}

/// An identifier with an optional `:type` annotation; the annotation carries no meaning here.
fn typed_name_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Ident> {
    ident_parser().then_ignore(just(Token::Colon).then(ident_parser()).or_not())
}

fn typed_names_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Vec<Ident>> {
    typed_name_parser()
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect()
}

fn literal_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, BigUint> {
    let number = choice((
        select! { Token::Int(int) => int }.from_str::<BigUint>().unwrapped(),
        select! { Token::Hex(hex) => hex }
            .map(|hex| BigUint::parse_bytes(hex.as_bytes(), 16).unwrap_or_default()),
        select! {
            Token::True => BigUint::from(1u8),
            Token::False => BigUint::from(0u8),
        },
    ));
    let string = select! { Token::Str(body) => body }.try_map(|body, span| {
        left_aligned_word(&lexer::unescape(body)).ok_or_else(|| {
            Rich::custom(
                span,
                format!("string literal \"{body}\" is longer than 32 bytes"),
            )
        })
    });
    number.or(string).then_ignore(just(Token::Colon).then(ident_parser()).or_not())
}

fn expr_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Expression> {
    recursive(|expr_parser| {
        let call = ident_parser()
            .then(
                expr_parser
                    .separated_by(just(Token::Comma))
                    .collect()
                    .delimited_by(just(Token::OpenParen), just(Token::CloseParen)),
            )
            .map(|(name, arguments)| Expression::Call(FunctionCall { name, arguments }));

        choice((
            call,
            ident_parser().map(Expression::Identifier),
            literal_parser().map(Expression::Literal),
        ))
    })
}

fn call_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Expression> {
    expr_parser().filter(|expr| matches!(expr, Expression::Call(_)))
}

fn block_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Block> {
    recursive(|block_parser| {
        let function = just(Token::Function)
            .ignore_then(ident_parser())
            .then(
                typed_name_parser()
                    .separated_by(just(Token::Comma))
                    .collect()
                    .delimited_by(just(Token::OpenParen), just(Token::CloseParen)),
            )
            .then(
                just(Token::ThinArrow)
                    .ignore_then(typed_names_parser())
                    .or_not()
                    .map(Option::unwrap_or_default),
            )
            .then(block_parser.clone())
            .map(|(((name, parameters), returns), body)| {
                Statement::FunctionDefinition(FunctionDefinition {
                    name,
                    parameters,
                    returns,
                    body,
                })
            });

        let r#let = just(Token::Let)
            .ignore_then(typed_names_parser())
            .then(just(Token::ColonEq).ignore_then(expr_parser()).or_not())
            .map(|(variables, value)| Statement::declare(variables, value));

        let assign = ident_parser()
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect()
            .then_ignore(just(Token::ColonEq))
            .then(expr_parser())
            .map(|(variables, value)| Statement::assign(variables, value));

        let r#if = just(Token::If)
            .ignore_then(expr_parser())
            .then(block_parser.clone())
            .map(|(condition, body)| {
                Statement::If(If {
                    condition,
                    body,
                    else_body: None,
                })
            });

        let case = just(Token::Case)
            .ignore_then(literal_parser())
            .then(block_parser.clone())
            .map(|(value, body)| Case { value, body });

        let default = just(Token::Default).ignore_then(block_parser.clone());

        let switch = just(Token::Switch)
            .ignore_then(expr_parser())
            .then(choice((
                case.repeated()
                    .at_least(1)
                    .collect::<Vec<_>>()
                    .then(default.clone().or_not()),
                default.map(|default| (vec![], Some(default))),
            )))
            .map(|(expression, (cases, default))| {
                Statement::Switch(Switch {
                    expression,
                    cases,
                    default,
                })
            });

        let r#for = just(Token::For)
            .ignore_then(block_parser.clone())
            .then(expr_parser())
            .then(block_parser.clone())
            .then(block_parser.clone())
            .map(|(((pre, condition), post), body)| {
                Statement::ForLoop(ForLoop {
                    pre,
                    condition,
                    post,
                    body,
                })
            });

        let statement = choice((
            block_parser.map(Statement::Block),
            function,
            r#let,
            assign,
            r#if,
            switch,
            r#for,
            just(Token::Break).to(Statement::Break),
            just(Token::Continue).to(Statement::Continue),
            just(Token::Leave).to(Statement::Leave),
            call_parser().map(Statement::Expression),
        ));

        statement
            .repeated()
            .collect()
            .delimited_by(just(Token::OpenBrace), just(Token::CloseBrace))
            .map(Block::new)
    })
}

pub(super) fn ast_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Block> {
    block_parser().then_ignore(end())
}
