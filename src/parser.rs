use nom::character;
use nom::character::complete;
use nom::combinator::{all_consuming, map_res};
use nom::multi;
use nom::number;
use nom::sequence::{preceded, tuple};
use nom::IResult;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::io::BufRead;

use crate::feature_buffer::SparseRow;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Copy)]
pub enum FileFormat {
    /// `label index:value index:value ...`
    LibSVM,
    /// `label field:index:value field:index:value ...`
    LibFFM,
}

pub fn parse_index(input: &str) -> IResult<&str, u32> {
    map_res(character::complete::digit1, |s: &str| s.parse::<u32>())(input)
}

pub fn parse_label(input: &str) -> IResult<&str, f32> {
    let (input, (_, label)) = tuple((character::complete::space0, number::complete::float))(input)?;
    Ok((input, label))
}

pub fn parse_libsvm_feature(input: &str) -> IResult<&str, (u32, f32)> {
    let (input, (index, _, value)) =
        tuple((parse_index, complete::char(':'), number::complete::float))(input)?;
    Ok((input, (index, value)))
}

pub fn parse_libffm_feature(input: &str) -> IResult<&str, (u32, u32, f32)> {
    let (input, (field, _, index, _, value)) = tuple((
        parse_index,
        complete::char(':'),
        parse_index,
        complete::char(':'),
        number::complete::float,
    ))(input)?;
    Ok((input, (field, index, value)))
}

fn parse_libsvm_line(input: &str) -> IResult<&str, SparseRow> {
    let (input, (label, features, _)) = all_consuming(tuple((
        parse_label,
        multi::many0(preceded(character::complete::space1, parse_libsvm_feature)),
        character::complete::space0,
    )))(input)?;
    let mut row = SparseRow::with_capacity(label, features.len());
    for (index, value) in features {
        row.add_feature(index, value);
    }
    Ok((input, row))
}

fn parse_libffm_line(input: &str) -> IResult<&str, SparseRow> {
    let (input, (label, features, _)) = all_consuming(tuple((
        parse_label,
        multi::many0(preceded(character::complete::space1, parse_libffm_feature)),
        character::complete::space0,
    )))(input)?;
    let mut row = SparseRow::with_capacity(label, features.len());
    for (field, index, value) in features {
        row.add_field_feature(index, value, field);
    }
    Ok((input, row))
}

/// Parses one line. Blank lines give `Ok(None)`, the bias entry is prepended to every row.
pub fn parse_line(format: FileFormat, line: &str) -> Result<Option<SparseRow>, String> {
    let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
    if line.trim().is_empty() {
        return Ok(None);
    }
    let parsed = match format {
        FileFormat::LibSVM => parse_libsvm_line(line),
        FileFormat::LibFFM => parse_libffm_line(line),
    };
    match parsed {
        Ok((_, row)) => Ok(Some(row)),
        Err(e) => Err(format!("Cannot parse {:?} line \"{}\": {}", format, line, e)),
    }
}

pub fn parse_all(format: FileFormat, input_bufreader: &mut dyn BufRead) -> Result<Vec<SparseRow>, Box<dyn Error>> {
    let mut rows = Vec::new();
    let mut line = String::new();
    let mut line_number: usize = 0;
    loop {
        line.clear();
        if input_bufreader.read_line(&mut line)? == 0 {
            break;
        }
        line_number += 1;
        match parse_line(format, &line) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => {}
            Err(e) => return Err(format!("Line {}: {}", line_number, e))?,
        }
    }
    log::debug!("Parsed {} examples from {} lines", rows.len(), line_number);
    Ok(rows)
}
