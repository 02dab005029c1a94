use std::borrow::Cow;

use on_change_path::{Key, Path, PathForm, Symbol};

fn both(text: &str) -> [Path; 2] {
    [
        Path::parse(PathForm::Joined, text),
        Path::parse(PathForm::Keys, text),
    ]
}

#[test]
fn path_concat_matrix() {
    let cases: [(&str, Key, &str); 5] = [
        ("", Key::from("a"), "a"),
        ("a", Key::from("b"), "a.b"),
        ("a.b", Key::Index(3), "a.b.3"),
        ("a", Key::absent(), "a"),
        ("", Key::absent(), ""),
    ];

    for (base, key, expected) in cases {
        for path in both(base) {
            let out = path.concat(&key);
            assert_eq!(out.to_string(), expected, "concat({base:?}, {key:?})");
            assert_eq!(out.form(), path.form());
        }
    }
}

#[test]
fn path_symbol_keys_stay_keys_in_key_form() {
    let tag = Symbol::new("tag");
    let path = Path::root(PathForm::Keys).concat(&Key::from(tag.clone()));
    assert_eq!(path.last(), Key::Symbol(tag.clone()));

    let joined = Path::root(PathForm::Joined).concat(&Key::Symbol(tag));
    assert_eq!(joined.to_string(), "Symbol(tag)");
}

#[test]
fn path_initial_last_matrix() {
    let cases = [
        ("a.b.c", "a.b", "c"),
        ("a", "", "a"),
        ("", "", ""),
    ];

    for (text, initial, last) in cases {
        for path in both(text) {
            assert_eq!(path.initial().to_string(), initial, "initial({text:?})");
            assert_eq!(path.last().to_string(), last, "last({text:?})");
        }
    }
}

#[test]
fn path_walk_matrix() {
    for path in both("list.0.name") {
        let keys: Vec<String> = path.walk().map(|key| key.to_string()).collect();
        assert_eq!(keys, vec!["list", "0", "name"]);
    }
    for path in both("") {
        assert_eq!(path.walk().count(), 0);
        assert!(path.is_root());
    }

    let path = Path::from_keys([Key::from("a")]);
    assert!(matches!(path.walk().next(), Some(Cow::Borrowed(_))));
}

#[test]
fn path_sub_path_matrix() {
    let cases = [
        ("a.b", "a", true),
        ("a.b", "a.b", true),
        ("a.b", "", true),
        ("", "", true),
        ("ab", "a", false),
        ("a", "a.b", false),
        ("x.a", "a", false),
    ];

    for (path, sub, expected) in cases {
        let [joined, keys] = both(path);
        let [sub_joined, sub_keys] = both(sub);
        assert_eq!(joined.is_sub_path(&sub_joined), expected, "{path:?} / {sub:?}");
        assert_eq!(keys.is_sub_path(&sub_keys), expected, "{path:?} / {sub:?}");
    }
}

#[test]
fn path_after_and_len() {
    for path in both("a.b.c") {
        assert_eq!(path.len(), 3);
        let prefix = Path::parse(path.form(), "a");
        assert_eq!(path.after(&prefix).to_string(), "b.c");
        assert_eq!(path.after(&Path::root(path.form())), path);
    }
}
