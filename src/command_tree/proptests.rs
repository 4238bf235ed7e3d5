//! Property-based tests for the command tree

use super::*;
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

fn arb_word() -> impl Strategy<Value = String> {
    "[a-d]{1,3}"
}

fn arb_phrase() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_word(), 1..=3).prop_map(|words| words.join(" "))
}

fn arb_phrases() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(arb_phrase(), 1..12).prop_map(|set| set.into_iter().collect())
}

/// Words that never appear in generated phrases
fn arb_foreign_word() -> impl Strategy<Value = String> {
    "[w-z]{1,3}"
}

fn build(phrases: &[String]) -> CommandTree<usize> {
    let mut tree = CommandTree::new();
    tree.add_commands(
        phrases
            .iter()
            .enumerate()
            .map(|(i, phrase)| (phrase.clone(), CommandEntry::Leaf(i))),
        Ok::<_, CommandTreeError>,
    )
    .unwrap();
    tree
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn exact_phrase_resolves_to_its_payload(phrases in arb_phrases()) {
        let tree = build(&phrases);
        for (i, phrase) in phrases.iter().enumerate() {
            let (payload, rest) = tree.get_command(phrase).unwrap();
            prop_assert_eq!(*payload, i);
            prop_assert_eq!(rest, "");
        }
    }

    #[test]
    fn trailing_word_becomes_remainder(phrases in arb_phrases(), extra in arb_foreign_word()) {
        let tree = build(&phrases);
        for (i, phrase) in phrases.iter().enumerate() {
            let (payload, rest) = tree.get_command(&format!("{phrase} {extra}")).unwrap();
            prop_assert_eq!(*payload, i);
            prop_assert_eq!(&rest, &extra);
        }
    }

    #[test]
    fn aliases_are_interchangeable(words in prop::collection::btree_set(arb_word(), 1..6)) {
        let words: Vec<String> = words.into_iter().collect();
        let mut tree = CommandTree::new();
        tree.add_commands(
            [(words.join("|"), CommandEntry::Leaf(42_u32))],
            Ok::<_, CommandTreeError>,
        )
        .unwrap();

        for word in &words {
            let (payload, rest) = tree.get_command(word).unwrap();
            prop_assert_eq!(*payload, 42);
            prop_assert_eq!(rest, "");
        }
    }

    #[test]
    fn unrelated_query_is_not_found(
        phrases in arb_phrases(),
        query in prop::collection::vec(arb_foreign_word(), 1..5),
    ) {
        let tree = build(&phrases);
        let text = query.join(" ");
        let result = tree.get_command(&text);
        prop_assert!(
            matches!(&result, Err(CommandTreeError::NoMatch { text: t }) if *t == text),
            "unexpected result for {:?}", text
        );
    }

    #[test]
    fn duplicate_registration_names_full_path(phrase in arb_phrase()) {
        let mut tree = build(std::slice::from_ref(&phrase));
        let err = tree
            .add_commands([(phrase.clone(), CommandEntry::Leaf(7))], Ok::<_, CommandTreeError>)
            .unwrap_err();
        let message = err.to_string();
        let expected = format!("\"{phrase}\"");
        prop_assert!(message.contains(&expected), "{}", message);
    }

    #[test]
    fn nested_groups_match_flat_phrases(
        heads in prop::collection::btree_set(arb_word(), 1..4),
        tails in prop::collection::btree_set(arb_word(), 1..4),
    ) {
        let heads: Vec<String> = heads.into_iter().collect();
        let tails: Vec<String> = tails.into_iter().collect();
        let mut tree = CommandTree::new();
        tree.add_commands(
            heads.iter().enumerate().map(|(h, head)| {
                (
                    head.clone(),
                    CommandEntry::group(
                        tails.iter().enumerate().map(|(t, tail)| (tail.clone(), CommandEntry::Leaf((h, t)))),
                    ),
                )
            }),
            Ok::<_, CommandTreeError>,
        )
        .unwrap();

        for (h, head) in heads.iter().enumerate() {
            for (t, tail) in tails.iter().enumerate() {
                let (payload, rest) = tree.get_command(&format!("{head} {tail}")).unwrap();
                prop_assert_eq!(*payload, (h, t));
                prop_assert_eq!(rest, "");
            }
        }
    }
}
