use std::{
    convert::TryFrom,
    str::FromStr,
    time::{Duration, SystemTime},
};

use chrono::NaiveDate;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_while, take_while1},
    combinator::{map, map_res, value},
    multi::fold_many0,
    sequence::delimited,
    IResult,
};

use super::char::*;
use crate::{types, Error, Num};

pub(super) fn integrity_string(input: &[u8]) -> IResult<&[u8], types::IntString> {
    // TODO: thirdp support
    map(
        delimited(tag(b"@"), take_while(is_intchar), tag(b"@")),
        |bytes| types::IntString(Vec::from(bytes)),
    )(input)
}

pub(super) fn id(input: &[u8]) -> IResult<&[u8], types::Id> {
    map(take_while(|c| is_idchar(c) || c == b'.'), |bytes| {
        types::Id(Vec::from(bytes))
    })(input)
}

pub(super) fn numlike(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(|c| c == b'.' || (c >= b'0' && c <= b'9'))(input)
}

pub(super) fn num(input: &[u8]) -> IResult<&[u8], Num> {
    map_res(numlike, Num::try_from)(input)
}

pub(super) fn date(input: &[u8]) -> IResult<&[u8], SystemTime> {
    map_res(numlike, parse_rcs_date)(input)
}

/// Parses an RCS date of the form `YY.MM.DD.hh.mm.ss`, where a four digit
/// year (post-2000 convention) is also accepted.
fn parse_rcs_date(bytes: &[u8]) -> Result<SystemTime, Error> {
    let s = std::str::from_utf8(bytes).map_err(Error::ParseUtf8)?;
    let parts = s
        .split('.')
        .map(u32::from_str)
        .collect::<Result<Vec<u32>, _>>()
        .map_err(|_| Error::InvalidDate(Vec::from(bytes)))?;

    if parts.len() != 6 {
        return Err(Error::InvalidDate(Vec::from(bytes)));
    }

    let year = if parts[0] >= 1900 {
        parts[0]
    } else {
        parts[0] + 1900
    } as i32;

    let datetime = NaiveDate::from_ymd_opt(year, parts[1], parts[2])
        .and_then(|date| date.and_hms_opt(parts[3], parts[4], parts[5]))
        .ok_or_else(|| Error::InvalidDate(Vec::from(bytes)))?;

    let secs = u64::try_from(datetime.timestamp()).map_err(|_| Error::InvalidDate(Vec::from(bytes)))?;

    Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
}

pub(super) fn string_literal(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_till1(|c| c == b'@')(input)
}

pub(super) fn string_escape(input: &[u8]) -> IResult<&[u8], &[u8]> {
    value(&b"@"[..], tag(b"@@"))(input)
}

pub(super) fn string(input: &[u8]) -> IResult<&[u8], types::VString> {
    map(
        delimited(
            tag(b"@"),
            fold_many0(
                alt((string_literal, string_escape)),
                Vec::new(),
                |mut v, fragment| {
                    v.extend_from_slice(fragment);
                    v
                },
            ),
            tag(b"@"),
        ),
        |bytes| types::VString(bytes),
    )(input)
}

pub(super) fn sym(input: &[u8]) -> IResult<&[u8], types::Sym> {
    map(take_while(is_idchar), |bytes| types::Sym(Vec::from(bytes)))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test() {
        assert_eq!(*integrity_string(b"@@").unwrap().1, b"");
        assert_eq!(*integrity_string(b"@foo@").unwrap().1, b"foo");
        assert_eq!(*integrity_string(b"@foo\x0cbar@").unwrap().1, b"foo\x0cbar");

        assert_eq!(string(b"@foo bar@").unwrap().1 .0, b"foo bar");
        assert_eq!(string(b"@foo@@bar@").unwrap().1 .0, b"foo@bar");
    }

    #[test]
    fn test_num() {
        assert_eq!(num(b"1.1").unwrap().1, Num::Commit(vec![1, 1]));
        assert_eq!(num(b"1.2.3").unwrap().1, Num::Branch(vec![1, 2, 3]));
    }

    #[test]
    fn test_date_two_digit_year() {
        let a = date(b"21.08.20.17.34.26").unwrap().1;
        let b = date(b"2021.08.20.17.34.26").unwrap().1;
        assert_eq!(a, b);
    }

    #[test]
    fn test_date_ordering() {
        let earlier = date(b"21.08.20.17.34.26").unwrap().1;
        let later = date(b"21.08.20.17.34.27").unwrap().1;
        assert!(earlier < later);
    }
}
