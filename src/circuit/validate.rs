//! Frame snapshot validation.

use crate::components::Element;
use crate::error::{CircuitError, Result};

/// Validate a frame snapshot before solving.
///
/// Checks:
/// - Both terminals of every element differ
/// - All parameters are finite
/// - Resistances are non-negative, capacitances and inductances positive
pub fn validate_elements(elements: &[Element]) -> Result<()> {
    for (index, element) in elements.iter().enumerate() {
        let [a, b] = element.nodes();
        if a == b {
            return Err(CircuitError::invalid_element(
                index,
                format!("both terminals connect to {}", a),
            ));
        }

        let (name, value, positive) = match element {
            Element::Battery(battery) => {
                check_finite(index, "voltage", battery.voltage)?;
                ("internal resistance", battery.internal_resistance, false)
            }
            Element::Resistor(r) => ("resistance", r.resistance, false),
            Element::Capacitor(c) => {
                check_finite(index, "stored voltage", c.state.voltage)?;
                check_finite(index, "stored current", c.state.current)?;
                ("capacitance", c.capacitance, true)
            }
            Element::Inductor(l) => {
                check_finite(index, "stored voltage", l.state.voltage)?;
                check_finite(index, "stored current", l.state.current)?;
                ("inductance", l.inductance, true)
            }
        };

        check_finite(index, name, value)?;
        if value < 0.0 || (positive && value == 0.0) {
            let bound = if positive { "positive" } else { "non-negative" };
            return Err(CircuitError::invalid_element(
                index,
                format!("{} must be {} (got {})", name, bound, value),
            ));
        }
    }

    Ok(())
}

fn check_finite(index: usize, name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CircuitError::invalid_element(
            index,
            format!("{} is not finite", name),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::NodeId;
    use crate::components::{Battery, Capacitor, Inductor, Resistor};

    fn nodes() -> [NodeId; 2] {
        [NodeId(0), NodeId(1)]
    }

    #[test]
    fn test_valid_snapshot() {
        let elements: Vec<Element> = vec![
            Battery::new(nodes(), 9.0).into(),
            Resistor::wire(nodes()).into(),
            Capacitor::new(nodes(), 1e-3).into(),
            Inductor::new(nodes(), 2.0).into(),
        ];
        assert!(validate_elements(&elements).is_ok());
    }

    #[test]
    fn test_shorted_terminals() {
        let elements: Vec<Element> = vec![Resistor::new([NodeId(2), NodeId(2)], 1.0).into()];
        let err = validate_elements(&elements).unwrap_err();
        assert!(matches!(err, CircuitError::InvalidElement { index: 0, .. }));
    }

    #[test]
    fn test_bad_parameters() {
        let cases: Vec<Element> = vec![
            Battery::new(nodes(), f64::NAN).into(),
            Battery::new(nodes(), 1.0).with_internal_resistance(-1.0).into(),
            Resistor::new(nodes(), f64::INFINITY).into(),
            Capacitor::new(nodes(), 0.0).into(),
            Inductor::new(nodes(), -2.0).into(),
        ];
        for case in cases {
            assert!(validate_elements(&[case]).is_err());
        }
    }
}
