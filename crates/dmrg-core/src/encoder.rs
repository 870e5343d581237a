//! Positional encoding of a [`ParameterSet`] into the solver's stdin line.
//!
//! Only keys from the solver's canonical order are emitted, in that order;
//! absent keys are skipped rather than defaulted.

use crate::domain::{CalculationKind, EncodedInput, Number, ParameterSet, ParameterValue};

pub fn encode_parameters(parameters: &ParameterSet, order: &[&str]) -> EncodedInput {
    let tokens = order
        .iter()
        .filter_map(|key| parameters.get(key))
        .map(render_value)
        .collect::<Vec<_>>();
    EncodedInput::new(tokens.join(" "))
}

pub fn encode_for_kind(parameters: &ParameterSet, kind: CalculationKind) -> EncodedInput {
    encode_parameters(parameters, kind.parameter_order())
}

pub fn render_value(value: &ParameterValue) -> String {
    match value {
        ParameterValue::Bool(flag) => flag.to_string(),
        ParameterValue::Number(number) => render_number(*number),
        ParameterValue::Text(text) => match value.as_flag() {
            Some(flag) => flag.to_string(),
            None => text.clone(),
        },
        ParameterValue::Sequence(values) => values
            .iter()
            .map(|number| render_number(*number))
            .collect::<Vec<_>>()
            .join(","),
        ParameterValue::Matrix(rows) => render_matrix(rows),
    }
}

fn render_matrix(rows: &[Vec<Number>]) -> String {
    let rendered_rows = rows
        .iter()
        .map(|row| {
            let entries = row
                .iter()
                .map(|number| render_number(*number))
                .collect::<Vec<_>>();
            format!("[{}]", entries.join(", "))
        })
        .collect::<Vec<_>>();
    format!("[{}]", rendered_rows.join(", "))
}

pub fn render_number(number: Number) -> String {
    match number {
        Number::Integer(value) => value.to_string(),
        Number::Float(value) => render_float(value),
    }
}

/// Shortest round-trip text; exponent form below 1e-4 and from 1e16 upward.
pub fn render_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(1.0e-4..1.0e16).contains(&magnitude) {
        let scientific = format!("{value:e}");
        let Some((mantissa, exponent)) = scientific.split_once('e') else {
            return scientific;
        };
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        return format!("{mantissa}e{sign}{digits:0>2}");
    }

    let plain = format!("{value}");
    if plain.contains('.') {
        plain
    } else {
        format!("{plain}.0")
    }
}
