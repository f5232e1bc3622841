//! Property tests for the live-table parser: it must never panic on
//! arbitrary input, and well-formed lines must round-trip their fields.

use kmod_inventory::sources::{parse_live_table, LoadedModule};
use proptest::prelude::*;

proptest! {
    #[test]
    fn parser_never_panics(input in "\\PC*") {
        let _ = parse_live_table(&input);
    }

    #[test]
    fn record_count_equals_well_formed_lines(count in 0usize..20) {
        let mut input = String::new();
        for i in 0..count {
            input.push_str(&format!(
                "mod{} {} {} - Live 0xffffffffc{:07x}\n",
                i, 4096 * (i + 1), i, i + 1
            ));
        }
        let (modules, warnings) = parse_live_table(&input);
        prop_assert_eq!(modules.len(), count);
        prop_assert!(warnings.is_empty());
    }

    #[test]
    fn dependency_field_round_trips(
        deps in proptest::collection::vec("[a-z][a-z0-9_]{0,12}", 0..6)
    ) {
        let field = if deps.is_empty() {
            "-".to_string()
        } else {
            // The kernel terminates non-empty dependency lists with a comma.
            format!("{},", deps.join(","))
        };
        let line = format!("testmod 4096 1 {} Live 0xffffffffc0000001\n", field);
        let (modules, warnings) = parse_live_table(&line);
        prop_assert!(warnings.is_empty());
        prop_assert_eq!(modules.len(), 1);
        let module: &LoadedModule = &modules[0];
        prop_assert_eq!(&module.dependencies, &deps);
    }

    #[test]
    fn sizes_and_refs_round_trip(size in 0u64..u64::MAX / 2, refs in 0u32..10_000) {
        let line = format!("m 1 1 - Live 0xffffffffc0000001\nm2 {} {} - Live 0xffffffffc0000002\n", size, refs);
        let (modules, _) = parse_live_table(&line);
        prop_assert_eq!(modules.len(), 2);
        prop_assert_eq!(modules[1].size, size);
        prop_assert_eq!(modules[1].ref_count, refs);
    }
}
