//! Pricing resolution for catalog services.
//!
//! A pure function from a service and its charging options to either a unit
//! price or the decision that the service can only be quoted.

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogService, ChargingKind, ChargingOption};
use crate::value_objects::{ChargingTypeId, Money};

/// Outcome of [`resolve_price`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum PriceResolution {
    /// A numeric unit price. `option` is None when the service's flat price applied.
    Priced {
        option: Option<ChargingOption>,
        unit_price: Money,
    },
    /// No resolvable price; the caller must route to a quote request.
    QuoteOnly,
}

impl PriceResolution {
    pub fn is_quote_only(&self) -> bool {
        matches!(self, PriceResolution::QuoteOnly)
    }

    pub fn unit_price(&self) -> Option<Money> {
        match self {
            PriceResolution::Priced { unit_price, .. } => Some(*unit_price),
            PriceResolution::QuoteOnly => None,
        }
    }
}

/// Whether an option can price a cart item on its own.
fn priced_amount(option: &ChargingOption) -> Option<Money> {
    match option.kind {
        ChargingKind::QuoteOnly => None,
        ChargingKind::Free => Some(Money::zero()),
        _ => Some(option.amount()).filter(Money::is_positive),
    }
}

/// Resolves the unit price for a service.
///
/// Preference order:
/// 1. the requested option, if it is among the options and has a usable price
/// 2. the first option with a strictly positive price
/// 3. the first `Free` option (an explicit zero)
/// 4. the service's flat price, if positive
///
/// Otherwise the service is quote-only. Malformed or missing prices read as
/// zero and so fall through to the next rule.
pub fn resolve_price(
    service: &CatalogService,
    options: &[ChargingOption],
    requested: Option<ChargingTypeId>,
) -> PriceResolution {
    let priced = |option: &ChargingOption| {
        priced_amount(option).map(|unit_price| PriceResolution::Priced {
            option: Some(option.clone()),
            unit_price,
        })
    };

    if let Some(requested) = requested
        && let Some(resolution) = options
            .iter()
            .filter(|o| o.charging_type_id == requested)
            .find_map(priced)
    {
        return resolution;
    }

    if let Some(resolution) = options
        .iter()
        .filter(|o| o.kind != ChargingKind::Free)
        .find_map(priced)
    {
        return resolution;
    }

    if let Some(resolution) = options
        .iter()
        .filter(|o| o.kind == ChargingKind::Free)
        .find_map(priced)
    {
        return resolution;
    }

    match service.flat_price.as_ref().map(|p| p.amount()) {
        Some(unit_price) if unit_price.is_positive() => PriceResolution::Priced {
            option: None,
            unit_price,
        },
        _ => PriceResolution::QuoteOnly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RawPrice;
    use crate::value_objects::ServiceId;
    use common::UserId;

    fn service(flat_price: Option<&str>) -> CatalogService {
        CatalogService {
            id: ServiceId::new(),
            name: "Desentupimento de Pia".to_string(),
            description: "Desentupimento de pia de cozinha".to_string(),
            category: "Hidráulica".to_string(),
            provider_id: UserId::new(),
            charging_options: vec![],
            flat_price: flat_price.map(RawPrice::from),
            is_active: true,
        }
    }

    fn option(kind: ChargingKind, price: Option<&str>) -> ChargingOption {
        ChargingOption::new(ChargingTypeId::new(), kind, price)
    }

    #[test]
    fn first_positive_option_wins() {
        let options = vec![
            option(ChargingKind::Hourly, Some("0")),
            option(ChargingKind::PerVisit, Some("80.00")),
            option(ChargingKind::Fixed, Some("120.00")),
        ];

        let resolution = resolve_price(&service(None), &options, None);

        assert_eq!(resolution.unit_price(), Some(Money::from_cents(8000)));
        match resolution {
            PriceResolution::Priced { option, .. } => {
                assert_eq!(option.map(|o| o.kind), Some(ChargingKind::PerVisit));
            }
            PriceResolution::QuoteOnly => panic!("expected a price"),
        }
    }

    #[test]
    fn valid_requested_option_beats_default() {
        let fixed = option(ChargingKind::Fixed, Some("120.00"));
        let options = vec![option(ChargingKind::PerVisit, Some("80.00")), fixed.clone()];

        let resolution = resolve_price(&service(None), &options, Some(fixed.charging_type_id));

        assert_eq!(resolution.unit_price(), Some(Money::from_cents(12000)));
    }

    #[test]
    fn unpriced_or_unknown_request_falls_back() {
        let unpriced = option(ChargingKind::Hourly, None);
        let options = vec![unpriced.clone(), option(ChargingKind::PerVisit, Some("80"))];

        let by_unpriced = resolve_price(&service(None), &options, Some(unpriced.charging_type_id));
        let by_unknown = resolve_price(&service(None), &options, Some(ChargingTypeId::new()));

        assert_eq!(by_unpriced.unit_price(), Some(Money::from_cents(8000)));
        assert_eq!(by_unknown.unit_price(), Some(Money::from_cents(8000)));
    }

    #[test]
    fn no_options_and_no_flat_price_is_quote_only() {
        assert!(resolve_price(&service(None), &[], None).is_quote_only());
    }

    #[test]
    fn malformed_prices_read_as_missing() {
        let options = vec![
            option(ChargingKind::Hourly, Some("a combinar")),
            option(ChargingKind::Fixed, Some("")),
        ];
        assert!(resolve_price(&service(Some("??")), &options, None).is_quote_only());
    }

    #[test]
    fn positive_flat_price_applies_without_options() {
        let resolution = resolve_price(&service(Some("150,00")), &[], None);
        assert_eq!(
            resolution,
            PriceResolution::Priced {
                option: None,
                unit_price: Money::from_cents(15000),
            }
        );
    }

    #[test]
    fn quote_only_kind_never_prices() {
        let options = vec![option(ChargingKind::QuoteOnly, Some("99.00"))];
        assert!(resolve_price(&service(None), &options, None).is_quote_only());
    }

    #[test]
    fn free_is_a_deliberate_zero() {
        let free = option(ChargingKind::Free, None);
        let resolution = resolve_price(&service(None), std::slice::from_ref(&free), None);
        assert_eq!(resolution.unit_price(), Some(Money::zero()));
    }

    #[test]
    fn positive_option_beats_free() {
        let options = vec![
            option(ChargingKind::Free, None),
            option(ChargingKind::Hourly, Some("40")),
        ];
        let resolution = resolve_price(&service(None), &options, None);
        assert_eq!(resolution.unit_price(), Some(Money::from_cents(4000)));
    }

    #[test]
    fn any_positive_option_is_never_quote_only() {
        let kinds = [ChargingKind::Hourly, ChargingKind::PerVisit, ChargingKind::Fixed];
        let prices = [None, Some("0"), Some("x"), Some("-3"), Some("0,01"), Some("250")];

        for kind in kinds {
            for (i, filler) in prices.iter().enumerate() {
                let mut options: Vec<_> = prices
                    .iter()
                    .take(i)
                    .map(|p| option(ChargingKind::Hourly, *p))
                    .collect();
                options.push(option(kind, Some("0,01")));
                options.push(option(ChargingKind::QuoteOnly, *filler));

                assert!(
                    !resolve_price(&service(None), &options, None).is_quote_only(),
                    "{kind:?} with {i} fillers"
                );
            }
        }
    }
}
