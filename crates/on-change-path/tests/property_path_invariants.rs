use on_change_path::{Key, Path, PathForm};
use proptest::prelude::*;

fn key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        "[a-z_][a-z0-9_]{0,6}".prop_map(Key::Name),
        (0usize..64).prop_map(Key::Index),
    ]
}

fn path_strategy(form: PathForm) -> impl Strategy<Value = Path> {
    prop::collection::vec(key_strategy(), 0..6).prop_map(move |keys| {
        keys.iter()
            .fold(Path::root(form), |path, key| path.concat(key))
    })
}

fn form_strategy() -> impl Strategy<Value = PathForm> {
    prop_oneof![Just(PathForm::Joined), Just(PathForm::Keys)]
}

proptest! {
    #[test]
    fn after_concat_yields_the_key(
        (form, path) in form_strategy().prop_flat_map(|form| (Just(form), path_strategy(form))),
        key in key_strategy(),
    ) {
        let extended = path.concat(&key);
        let rest = extended.after(&path);
        let keys: Vec<String> = rest.walk().map(|k| k.to_string()).collect();
        prop_assert_eq!(keys, vec![key.to_string()]);
        prop_assert_eq!(rest.form(), form);
    }

    #[test]
    fn concat_then_initial_and_last(
        path in form_strategy().prop_flat_map(path_strategy),
        key in key_strategy(),
    ) {
        let extended = path.concat(&key);
        prop_assert_eq!(extended.initial(), path.clone());
        prop_assert_eq!(extended.last().to_string(), key.to_string());
        prop_assert!(extended.is_sub_path(&path));
        prop_assert!(path.is_strict_ancestor_of(&extended));
        prop_assert_eq!(extended.len(), path.len() + 1);
    }

    #[test]
    fn walk_visits_every_concatenated_key(keys in prop::collection::vec(key_strategy(), 0..6)) {
        for form in [PathForm::Joined, PathForm::Keys] {
            let path = keys.iter().fold(Path::root(form), |path, key| path.concat(key));
            let walked: Vec<String> = path.walk().map(|k| k.to_string()).collect();
            let expected: Vec<String> = keys.iter().map(ToString::to_string).collect();
            prop_assert_eq!(walked, expected);
        }
    }
}
