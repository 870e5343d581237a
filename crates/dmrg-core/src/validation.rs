use crate::domain::{CalculationKind, DmrgError, DmrgResult, Number, ParameterSet, ParameterValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueRule {
    Real,
    Count { minimum: i64 },
    Flag,
    Coupling,
}

const DMRG_RULES: [(&str, ValueRule); 8] = [
    ("S", ValueRule::Real),
    ("N_sites", ValueRule::Count { minimum: 1 }),
    ("J", ValueRule::Coupling),
    ("Sz", ValueRule::Real),
    ("n_excitations", ValueRule::Count { minimum: 0 }),
    ("conserve_symmetry", ValueRule::Flag),
    ("print_HDF5", ValueRule::Flag),
    ("maximal_energy", ValueRule::Flag),
];

const DYNCORR_RULES: [(&str, ValueRule); 3] = [
    ("J", ValueRule::Coupling),
    ("N_max", ValueRule::Count { minimum: 1 }),
    ("cutoff", ValueRule::Real),
];

fn rules_for(kind: CalculationKind) -> &'static [(&'static str, ValueRule)] {
    match kind {
        CalculationKind::Dmrg => &DMRG_RULES,
        CalculationKind::DynCorr => &DYNCORR_RULES,
    }
}

/// Keys whose value must stay a whole number for either solver.
pub fn is_count_parameter(name: &str) -> bool {
    DMRG_RULES
        .iter()
        .chain(DYNCORR_RULES.iter())
        .any(|(key, rule)| *key == name && matches!(rule, ValueRule::Count { .. }))
}

/// Rejects values the encoder must never see. Unknown keys pass through.
pub fn validate_parameters(kind: CalculationKind, parameters: &ParameterSet) -> DmrgResult<()> {
    for (key, value) in parameters.iter() {
        if let ParameterValue::Sequence(values) = value
            && values.is_empty()
        {
            return Err(DmrgError::input_validation(
                "INPUT.EMPTY_SEQUENCE",
                format!("{kind} parameter '{key}' is an empty sequence"),
            ));
        }

        let Some((_, rule)) = rules_for(kind).iter().find(|(name, _)| *name == key) else {
            continue;
        };
        check_rule(kind, key, value, *rule)?;
    }

    if let Some(ParameterValue::Matrix(rows)) = parameters.get("J")
        && let Some(sites) = parameters
            .get("N_sites")
            .and_then(ParameterValue::as_number)
            .and_then(Number::as_integer)
        && rows.len() as i64 != sites
    {
        return Err(DmrgError::input_validation(
            "INPUT.COUPLING_DIMENSIONS",
            format!(
                "{kind} coupling matrix is {}x{} but N_sites is {}",
                rows.len(),
                rows.len(),
                sites
            ),
        ));
    }

    Ok(())
}

fn check_rule(
    kind: CalculationKind,
    key: &str,
    value: &ParameterValue,
    rule: ValueRule,
) -> DmrgResult<()> {
    let kind_error = |expected: &str| {
        DmrgError::input_validation(
            "INPUT.PARAMETER_KIND",
            format!(
                "{kind} parameter '{key}' expects {expected}, got {}",
                value.kind_name()
            ),
        )
    };

    match rule {
        ValueRule::Real => match value.as_number() {
            Some(number) if number.as_f64().is_finite() => Ok(()),
            Some(_) => Err(kind_error("a finite number")),
            None => Err(kind_error("a number")),
        },
        ValueRule::Count { minimum } => {
            let count = value
                .as_number()
                .and_then(Number::as_integer)
                .ok_or_else(|| kind_error("an integer"))?;
            if count < minimum {
                return Err(DmrgError::input_validation(
                    "INPUT.PARAMETER_RANGE",
                    format!("{kind} parameter '{key}' must be at least {minimum}, got {count}"),
                ));
            }
            Ok(())
        }
        ValueRule::Flag => value
            .as_flag()
            .map(|_| ())
            .ok_or_else(|| kind_error("a boolean")),
        ValueRule::Coupling => match value {
            ParameterValue::Number(_) => Ok(()),
            ParameterValue::Matrix(rows) => check_square_matrix(kind, key, rows),
            _ => Err(kind_error("a number or a square matrix")),
        },
    }
}

fn check_square_matrix(kind: CalculationKind, key: &str, rows: &[Vec<Number>]) -> DmrgResult<()> {
    if rows.is_empty() {
        return Err(DmrgError::input_validation(
            "INPUT.COUPLING_SHAPE",
            format!("{kind} parameter '{key}' is an empty matrix"),
        ));
    }

    let width = rows[0].len();
    if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
        return Err(DmrgError::input_validation(
            "INPUT.COUPLING_SHAPE",
            format!(
                "{kind} parameter '{key}' is ragged: row {index} has {} columns, expected {width}",
                row.len()
            ),
        ));
    }

    if width != rows.len() {
        return Err(DmrgError::input_validation(
            "INPUT.COUPLING_SHAPE",
            format!(
                "{kind} parameter '{key}' must be square, got {}x{width}",
                rows.len()
            ),
        ));
    }

    Ok(())
}
