use {frontend::ast::Ident, std::collections::BTreeMap};

/// Allocates identifiers of the form `__warp_<prefix>_<n>`, one counter per prefix.
#[derive(Debug, Default)]
pub struct NameGenerator {
    counters: BTreeMap<String, usize>,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, prefix: &str) -> Ident {
        let counter = self.counters.entry(prefix.to_owned()).or_default();
        let name = format!("{}_{prefix}_{counter}", frontend::RESERVED_PREFIX);
        *counter += 1;
        name
    }

    pub fn fresh_from(&mut self, name: &str) -> Ident {
        let base = name
            .strip_prefix(frontend::RESERVED_PREFIX)
            .map(|rest| rest.trim_start_matches('_'))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(name);
        self.fresh(base)
    }
}

pub fn is_generated(name: &str) -> bool {
    name.starts_with(frontend::RESERVED_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_prefix() {
        let mut names = NameGenerator::new();
        assert_eq!(names.fresh("subexpr"), "__warp_subexpr_0");
        assert_eq!(names.fresh("subexpr"), "__warp_subexpr_1");
        assert_eq!(names.fresh("loop"), "__warp_loop_0");
        assert_eq!(names.fresh("subexpr"), "__warp_subexpr_2");
    }

    #[test]
    fn fresh_from_strips_generated_prefix() {
        let mut names = NameGenerator::new();
        assert_eq!(names.fresh_from("total"), "__warp_total_0");
        assert_eq!(names.fresh_from("__warp_subexpr_3"), "__warp_subexpr_3_0");
        assert!(is_generated(&names.fresh_from("x")));
    }
}
