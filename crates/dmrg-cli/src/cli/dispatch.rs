use dmrg_core::domain::CalculationKind;

pub(super) const KIND_TOKENS: [(&str, CalculationKind); 4] = [
    ("dmrg", CalculationKind::Dmrg),
    ("dyncorr", CalculationKind::DynCorr),
    ("dynamcor", CalculationKind::DynCorr),
    ("dynamic-correlator", CalculationKind::DynCorr),
];

pub(super) fn parse_calculation_kind(token: &str) -> Option<CalculationKind> {
    let normalized = token.trim().to_ascii_lowercase();
    KIND_TOKENS
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, kind)| *kind)
}

/// clap value parser for `--kind`.
pub(super) fn kind_value_parser(token: &str) -> Result<CalculationKind, String> {
    parse_calculation_kind(token).ok_or_else(|| {
        format!(
            "unknown calculation kind '{token}'; expected one of: {}",
            KIND_TOKENS
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", ")
        )
    })
}
