//! # Property-Based Tests
//!
//! Round-trip invariants over randomly generated stores: the loaded store
//! is isomorphic to the saved one, values are bit-exact, and saving is
//! deterministic.

use atomspace_core::{
    AtomSpace, AtomStore, AttentionValue, Handle, SavingLoading, TruthValue, Type,
};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::BTreeMap;

/// Structural identity of an atom, independent of its handle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Shape {
    Node(u16, String),
    Link(u16, Vec<Shape>),
}

/// What must survive a round trip bit for bit.
type Payload = (u8, Vec<u32>, AttentionValue);

fn shape(store: &AtomSpace, handle: Handle) -> Shape {
    let atom = store.get(handle).expect("atom");
    match atom.name() {
        Some(name) => Shape::Node(atom.atom_type.0, name.to_string()),
        None => Shape::Link(
            atom.atom_type.0,
            atom.outgoing().iter().map(|h| shape(store, *h)).collect(),
        ),
    }
}

fn canonical(store: &AtomSpace) -> BTreeMap<Shape, Payload> {
    store
        .handles()
        .into_iter()
        .map(|h| {
            let atom = store.get(h).expect("atom");
            let tv = atom.truth_value;
            (shape(store, h), (tv.tag(), tv.to_bits(), atom.attention_value))
        })
        .collect()
}

fn truth_value(tag: u8, bits: [u32; 3]) -> TruthValue {
    let [a, b, c] = bits.map(f32::from_bits);
    match tag % 3 {
        0 => TruthValue::simple(a, b),
        1 => TruthValue::Count {
            strength: a,
            confidence: b,
            count: c,
        },
        _ => TruthValue::Indefinite {
            lower: a,
            upper: b,
            confidence_level: c,
        },
    }
}

type NodeGen = (u16, String, u8, [u32; 3], (i16, i16, u16));
type LinkGen = (u16, Vec<Index>, u8, [u32; 3], (i16, i16, u16));

fn build(nodes: &[NodeGen], links: &[LinkGen]) -> AtomSpace {
    let mut space = AtomSpace::new();
    let mut handles = Vec::new();

    for (ty, name, tag, bits, (sti, lti, vlti)) in nodes {
        // ConceptNode..=VariableNode
        let atom_type = Type(2 + ty % 5);
        let h = space
            .add_node(
                atom_type,
                name,
                truth_value(*tag, *bits),
                AttentionValue::new(*sti, *lti, *vlti),
            )
            .expect("node");
        handles.push(h);
    }
    for (ty, picks, tag, bits, (sti, lti, vlti)) in links {
        // ListLink..=NotLink
        let atom_type = Type(7 + ty % 9);
        let outgoing = picks.iter().map(|i| *i.get(&handles)).collect();
        let h = space
            .add_link(
                atom_type,
                outgoing,
                truth_value(*tag, *bits),
                AttentionValue::new(*sti, *lti, *vlti),
            )
            .expect("link");
        handles.push(h);
    }
    space
}

fn node_gen() -> impl Strategy<Value = NodeGen> {
    (
        any::<u16>(),
        "[a-z]{1,6}",
        any::<u8>(),
        any::<[u32; 3]>(),
        any::<(i16, i16, u16)>(),
    )
}

fn link_gen() -> impl Strategy<Value = LinkGen> {
    (
        any::<u16>(),
        vec(any::<Index>(), 1..4),
        any::<u8>(),
        any::<[u32; 3]>(),
        any::<(i16, i16, u16)>(),
    )
}

fn roundtrip(space: &AtomSpace) -> (Vec<u8>, AtomSpace) {
    let mut persist = SavingLoading::new();
    let mut image = Vec::new();
    persist.save_to_writer(&mut image, space).expect("save");
    let mut restored = AtomSpace::new();
    persist
        .load_from_reader(image.as_slice(), &mut restored)
        .expect("load");
    (image, restored)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// The loaded store is the saved store up to handle renumbering,
    /// with bit-exact truth and attention values.
    #[test]
    fn roundtrip_is_isomorphic(
        nodes in vec(node_gen(), 1..20),
        links in vec(link_gen(), 0..20),
    ) {
        let space = build(&nodes, &links);
        let (_, restored) = roundtrip(&space);

        prop_assert_eq!(restored.atom_count(), space.atom_count());
        prop_assert_eq!(restored.node_count(), space.node_count());
        prop_assert!(restored.dangling_links().is_empty());
        prop_assert_eq!(canonical(&restored), canonical(&space));
    }

    /// Saving the same store twice gives the same bytes.
    #[test]
    fn save_is_deterministic(
        nodes in vec(node_gen(), 1..10),
        links in vec(link_gen(), 0..10),
    ) {
        let space = build(&nodes, &links);
        let mut first = Vec::new();
        let mut second = Vec::new();
        SavingLoading::new().save_to_writer(&mut first, &space).expect("save");
        SavingLoading::new().save_to_writer(&mut second, &space).expect("save");
        prop_assert_eq!(first, second);
    }

    /// After one load the handle order is normalized: the next cycle
    /// reproduces the image exactly.
    #[test]
    fn second_cycle_is_fixed_point(
        nodes in vec(node_gen(), 1..10),
        links in vec(link_gen(), 0..10),
    ) {
        let space = build(&nodes, &links);
        let (_, once) = roundtrip(&space);
        let (second, twice) = roundtrip(&once);
        let (third, _) = roundtrip(&twice);
        prop_assert_eq!(second, third);
    }

    /// Every index list refers only to atoms of the loaded store.
    #[test]
    fn indices_are_remapped(
        nodes in vec(node_gen(), 1..15),
        links in vec(link_gen(), 0..15),
    ) {
        let space = build(&nodes, &links);
        let (_, restored) = roundtrip(&space);

        for index in restored.index_snapshot() {
            for list in index.lists {
                for handle in list.handles {
                    prop_assert!(restored.get(handle).is_some());
                }
            }
        }
    }
}
