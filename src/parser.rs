use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_until, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map_res, opt},
    sequence::{delimited, preceded},
    IResult,
};

use crate::model::Topic;

#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    Count { topic: Topic },
    Search { topic: Topic, query: String, limit: usize },
    Import { topic: Topic, path: String },
    Erase { topic: Topic },
    Save { topic: Topic, path: String },
    Restore { topic: Topic, path: String },
    Help,
    Exit,
}

// --- BASIC PARSERS ---

fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, content) = take_until("\"")(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, content.to_string()))
}

fn parse_topic(input: &str) -> IResult<&str, Topic> {
    map_res(take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'), |s: &str| s.parse::<Topic>())(input)
}

// --- HELPERS ---
fn ws<'a, F, O, E: nom::error::ParseError<&'a str>>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where F: FnMut(&'a str) -> IResult<&'a str, O, E> {
    delimited(multispace0, inner, multispace0)
}

fn tag_ci(t: &'static str) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| tag_no_case(t)(input)
}

// --- COMMAND PARSERS ---

fn parse_count(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("COUNT")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, topic) = parse_topic(input)?;
    Ok((input, Command::Count { topic }))
}

fn parse_search(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("SEARCH"), tag_ci("FIND")))(input)?;
    let (input, _) = multispace1(input)?;
    let (input, topic) = parse_topic(input)?;
    let (input, query) = ws(parse_quoted_string)(input)?;

    let (input, limit) = opt(preceded(
        ws(tag_ci("LIMIT")),
        map_res(digit1, |s: &str| s.parse::<usize>()),
    ))(input)?;

    Ok((input, Command::Search { topic, query, limit: limit.unwrap_or(1) }))
}

fn parse_import(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("IMPORT")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, topic) = parse_topic(input)?;
    let (input, _) = ws(tag_ci("FROM"))(input)?;
    let (input, path) = parse_quoted_string(input)?;
    Ok((input, Command::Import { topic, path }))
}

fn parse_erase(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("ERASE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, topic) = parse_topic(input)?;
    Ok((input, Command::Erase { topic }))
}

fn parse_save(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("SAVE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, topic) = parse_topic(input)?;
    let (input, _) = ws(tag_ci("TO"))(input)?;
    let (input, path) = parse_quoted_string(input)?;
    Ok((input, Command::Save { topic, path }))
}

fn parse_restore(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("RESTORE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, topic) = parse_topic(input)?;
    let (input, _) = ws(tag_ci("FROM"))(input)?;
    let (input, path) = parse_quoted_string(input)?;
    Ok((input, Command::Restore { topic, path }))
}

fn parse_help(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("HELP")(input)?;
    Ok((input, Command::Help))
}

fn parse_exit(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("EXIT"), tag_ci("QUIT")))(input)?;
    Ok((input, Command::Exit))
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let result = alt((
        parse_count,
        parse_search,
        parse_import,
        parse_erase,
        parse_save,
        parse_restore,
        parse_help,
        parse_exit,
    ))(input);

    match result {
        Ok((remainder, cmd)) => {
            if !remainder.trim().is_empty() {
                return Err(format!("Unexpected tokens at end: '{}'", remainder));
            }
            Ok(cmd)
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let context: String = e.input.chars().take(20).collect();
            if context.len() < e.input.len() {
                Err(format!("Invalid syntax near: '{}...'", context))
            } else {
                Err(format!("Invalid syntax near: '{}'", context))
            }
        },
        Err(nom::Err::Incomplete(_)) => Err("Incomplete command.".to_string()),
    }
}
