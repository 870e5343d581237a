//! Reader for the historical five-line DMRG input deck.
//!
//! ```text
//! <title>
//! <comment>
//! <S> <N_sites>
//! <J: scalar or nested list>
//! <Sz> <n_excitations> <conserve_symmetry 0|1> <print_HDF5 0|1>
//! ```

use crate::classifier::literal::{LiteralValue, parse_literal};
use crate::domain::{DmrgError, Number, ParameterSet, ParameterValue, ParserResult};
use std::fs;
use std::path::Path;

const DECK_PLACEHOLDER: &str = "INPUT.LEGACY_DECK";

pub fn load_legacy_deck(path: impl AsRef<Path>) -> ParserResult<ParameterSet> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| {
        DmrgError::io_system(
            "IO.LEGACY_DECK",
            format!("failed to read legacy deck '{}': {source}", path.display()),
        )
    })?;
    parse_legacy_deck(&source)
}

pub fn parse_legacy_deck(source: &str) -> ParserResult<ParameterSet> {
    let mut lines = source.lines();
    let mut next_line = |name: &str| {
        lines
            .next()
            .ok_or_else(|| deck_error(format!("missing {name} line")))
    };

    let title = next_line("title")?.trim_end().to_string();
    let comment = next_line("comment")?.trim_end().to_string();

    let system_line = next_line("spin/site")?;
    let mut system = system_line.split_whitespace();
    let spin = parse_float(system.next(), "S")?;
    let sites = parse_integer(system.next(), "N_sites")?;

    let coupling = parse_coupling(next_line("coupling")?.trim())?;

    let control_line = next_line("control")?;
    let mut control = control_line.split_whitespace();
    let sz = parse_float(control.next(), "Sz")?;
    let excitations = parse_integer(control.next(), "n_excitations")?;
    let conserve_symmetry = parse_flag(control.next(), "conserve_symmetry")?;
    let print_hdf5 = parse_flag(control.next(), "print_HDF5")?;

    Ok(ParameterSet::new()
        .with("title", title)
        .with("comment", comment)
        .with("S", spin)
        .with("N_sites", sites)
        .with("J", coupling)
        .with("Sz", sz)
        .with("n_excitations", excitations)
        .with("conserve_symmetry", conserve_symmetry)
        .with("print_HDF5", print_hdf5))
}

fn deck_error(message: impl Into<String>) -> DmrgError {
    DmrgError::input_validation(DECK_PLACEHOLDER, message)
}

fn parse_float(token: Option<&str>, name: &str) -> ParserResult<f64> {
    let token = token.ok_or_else(|| deck_error(format!("missing value for {name}")))?;
    token
        .parse::<f64>()
        .map_err(|_| deck_error(format!("{name} must be a number, got '{token}'")))
}

fn parse_integer(token: Option<&str>, name: &str) -> ParserResult<i64> {
    let token = token.ok_or_else(|| deck_error(format!("missing value for {name}")))?;
    token
        .parse::<i64>()
        .map_err(|_| deck_error(format!("{name} must be an integer, got '{token}'")))
}

fn parse_flag(token: Option<&str>, name: &str) -> ParserResult<bool> {
    match parse_integer(token, name)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(deck_error(format!("{name} must be 0 or 1, got {other}"))),
    }
}

fn parse_coupling(text: &str) -> ParserResult<ParameterValue> {
    if let Ok(value) = text.parse::<i64>() {
        return Ok(ParameterValue::from(value));
    }

    let literal = parse_literal(text).map_err(|error| deck_error(format!("J: {error}")))?;
    match &literal {
        LiteralValue::Number(value) => Ok(ParameterValue::from(*value)),
        LiteralValue::List(_) => {
            let rows = literal
                .as_matrix()
                .ok_or_else(|| deck_error("J must be a scalar or a rectangular nested list"))?;
            Ok(ParameterValue::Matrix(
                rows.into_iter()
                    .map(|row| row.into_iter().map(integral_number).collect())
                    .collect(),
            ))
        }
        LiteralValue::Bool(_) => Err(deck_error("J must be a scalar or a nested list, got a boolean")),
    }
}

fn integral_number(value: f64) -> Number {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Number::Integer(value as i64)
    } else {
        Number::Float(value)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_legacy_deck;
    use crate::domain::{CalculationKind, ParameterValue};
    use crate::encoder::encode_for_kind;

    const DECK: &str = "\
Heisenberg chain
four sites, open boundary
1.0 4
[[0, 23, 0, 0], [23, 0, 38, 0], [0, 38, 0, 23], [0, 0, 23, 0]]
0 0 0 1
";

    #[test]
    fn five_line_deck_reads_into_parameters() {
        let parameters = parse_legacy_deck(DECK).expect("deck should parse");

        assert_eq!(
            parameters.get("title"),
            Some(&ParameterValue::from("Heisenberg chain"))
        );
        assert_eq!(parameters.get("N_sites"), Some(&ParameterValue::from(4)));
        assert_eq!(parameters.get("print_HDF5"), Some(&ParameterValue::from(true)));
        assert!(!parameters.contains_key("maximal_energy"));

        let encoded = encode_for_kind(&parameters, CalculationKind::Dmrg);
        assert_eq!(
            encoded.as_str(),
            "1.0 4 [[0, 23, 0, 0], [23, 0, 38, 0], [0, 38, 0, 23], [0, 0, 23, 0]] 0.0 0 false true"
        );
    }

    #[test]
    fn scalar_coupling_is_accepted() {
        let deck = DECK.replace("[[0, 23, 0, 0], [23, 0, 38, 0], [0, 38, 0, 23], [0, 0, 23, 0]]", "2");
        let parameters = parse_legacy_deck(&deck).expect("deck should parse");
        assert_eq!(parameters.get("J"), Some(&ParameterValue::from(2)));

        let deck = DECK.replace("[[0, 23, 0, 0], [23, 0, 38, 0], [0, 38, 0, 23], [0, 0, 23, 0]]", "0.75");
        let parameters = parse_legacy_deck(&deck).expect("deck should parse");
        assert_eq!(parameters.get("J"), Some(&ParameterValue::from(0.75)));
    }

    #[test]
    fn truncated_deck_names_the_missing_line() {
        let error = parse_legacy_deck("title\ncomment\n1.0 4\n").expect_err("deck is truncated");
        assert_eq!(error.placeholder(), "INPUT.LEGACY_DECK");
        assert!(error.message().contains("coupling"));
    }

    #[test]
    fn bad_tokens_are_rejected() {
        for deck in [
            "t\nc\none 4\n2\n0 0 0 0\n",
            "t\nc\n1.0 4.5\n2\n0 0 0 0\n",
            "t\nc\n1.0 4\nJ\n0 0 0 0\n",
            "t\nc\n1.0 4\n2\n0 0 2 0\n",
            "t\nc\n1.0 4\n2\n0 0 0\n",
            "t\nc\n1.0 4\n[[1, 2], [3]]\n0 0 0 0\n",
        ] {
            let error = parse_legacy_deck(deck).expect_err("deck should be rejected");
            assert_eq!(error.placeholder(), "INPUT.LEGACY_DECK", "deck: {deck:?}");
        }
    }
}
