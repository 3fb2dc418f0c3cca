use super::ConstructorDefinition;

/// Pick the constructor to call given which names have a value.
///
/// Only constructors with every required parameter available qualify. Among
/// those, the one with the most available parameters wins; ties go to the one
/// with fewer parameters, then to declaration order.
pub fn select_constructor<'a, F>(
    definitions: &'a [ConstructorDefinition],
    is_available: F,
) -> Option<&'a ConstructorDefinition>
where
    F: Fn(&str) -> bool,
{
    let mut best: Option<(&ConstructorDefinition, usize)> = None;

    for definition in definitions {
        let mut satisfied = 0;
        let mut missing_required = false;
        for param in &definition.parameters {
            if is_available(&param.name) {
                satisfied += 1;
            } else if param.required {
                missing_required = true;
                break;
            }
        }
        if missing_required {
            continue;
        }

        let better = match best {
            None => true,
            Some((current, current_satisfied)) => {
                satisfied > current_satisfied
                    || (satisfied == current_satisfied
                        && definition.parameters.len() < current.parameters.len())
            }
        };
        if better {
            best = Some((definition, satisfied));
        }
    }

    best.map(|(definition, _)| definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generic::GenericType;
    use crate::introspect::{ConstructorHandle, ConstructorParameter};

    fn ctor(params: &[(&str, GenericType)]) -> ConstructorDefinition {
        let parameters: Vec<_> = params
            .iter()
            .map(|(name, ty)| ConstructorParameter::new(*name, ty.clone()))
            .collect();
        let descriptor: String = parameters.iter().map(|p| p.declared.descriptor()).collect();
        ConstructorDefinition {
            handle: ConstructorHandle {
                owner: "com/example/Person".into(),
                descriptor: format!("({descriptor})V"),
                access_flags: 1,
            },
            parameters,
        }
    }

    #[test]
    fn fewer_parameters_win_ties() {
        let defs = [
            ctor(&[("name", GenericType::string()), ("age", GenericType::class("java/lang/Integer"))]),
            ctor(&[("name", GenericType::string())]),
        ];
        let chosen = select_constructor(&defs, |n| n == "name").unwrap();
        assert_eq!(chosen.parameters.len(), 1);
    }

    #[test]
    fn unmatched_required_parameter_disqualifies() {
        let defs = [
            ctor(&[("name", GenericType::string()), ("age", GenericType::int())]),
            ctor(&[]),
        ];
        let chosen = select_constructor(&defs, |n| n == "name").unwrap();
        assert!(chosen.parameters.is_empty());
    }

    #[test]
    fn most_satisfied_wins() {
        let defs = [
            ctor(&[("name", GenericType::string())]),
            ctor(&[("name", GenericType::string()), ("age", GenericType::int())]),
        ];
        let chosen = select_constructor(&defs, |n| n == "name" || n == "age").unwrap();
        assert_eq!(chosen.parameters.len(), 2);
    }

    #[test]
    fn declaration_order_breaks_remaining_ties() {
        let defs = [
            ctor(&[("id", GenericType::long())]),
            ctor(&[("id", GenericType::string())]),
        ];
        let chosen = select_constructor(&defs, |n| n == "id").unwrap();
        assert_eq!(chosen.handle.descriptor, "(J)V");
    }

    #[test]
    fn nothing_qualifies() {
        let defs = [ctor(&[("age", GenericType::int())])];
        assert!(select_constructor(&defs, |_| false).is_none());
    }
}
