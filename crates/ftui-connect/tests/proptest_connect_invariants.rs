#![forbid(unsafe_code)]

//! Property-based invariant tests for connected components.
//!
//! Verifies:
//! 1. Pure instances never re-render for changes outside their mapped slice
//! 2. A state-only mapper re-renders iff its derived props differ
//! 3. Impure instances schedule an update for every notification
//! 4. Own props always win over derived props with the same key
//! 5. A factory mapper runs exactly once per instance
//! 6. Subscribe and unsubscribe happen at most once however often the
//!    lifecycle hooks run

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ftui_connect::{
    BuildMode, Component, ConnectOptions, MapState, Props, Scope, Selector, Store, StoreHandle,
    UpdateOutcome, connect,
};
use proptest::prelude::*;
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
struct Pair {
    watched: i64,
    ignored: i64,
}

#[derive(Clone, Default)]
struct Counting {
    renders: Rc<Cell<usize>>,
}

impl Component for Counting {
    type Output = Props;

    fn render(&mut self, props: &Props) -> Props {
        self.renders.set(self.renders.get() + 1);
        props.clone()
    }
}

fn options(pure: bool) -> ConnectOptions {
    ConnectOptions::default()
        .with_pure(pure)
        .with_mode(BuildMode::Development)
}

fn watched_mapper() -> MapState<Pair> {
    MapState::props(|s: &Pair| json!({ "watched": s.watched }))
}

fn mounted(
    store: &Store<Pair>,
    mapper: MapState<Pair>,
    pure: bool,
    own: Props,
) -> (ftui_connect::ConnectedInstance<Pair, Counting>, Rc<Cell<usize>>) {
    let renders = Rc::new(Cell::new(0));
    let probe = Counting {
        renders: Rc::clone(&renders),
    };
    let mut inst = connect(Some(mapper), options(pure))
        .wrap(move || probe.clone())
        .construct(&Scope::root(), Some(StoreHandle::new(store.clone())), own)
        .unwrap();
    inst.mount();
    inst.render().unwrap();
    (inst, renders)
}

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Edit {
    Watched(i64),
    Ignored(i64),
    Same,
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (-5i64..5).prop_map(Edit::Watched),
        any::<i64>().prop_map(Edit::Ignored),
        Just(Edit::Same),
    ]
}

fn apply(store: &Store<Pair>, edit: &Edit) {
    match *edit {
        Edit::Watched(v) => store.update(|s| Pair {
            watched: v,
            ..s.clone()
        }),
        Edit::Ignored(v) => store.update(|s| Pair {
            ignored: v,
            ..s.clone()
        }),
        Edit::Same => store.emit_change(),
    }
}

fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("watched".to_string()), "[a-d]{1,3}"]
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Irrelevant changes never re-render a pure instance
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn pure_ignores_irrelevant_changes(values in proptest::collection::vec(any::<i64>(), 1..20)) {
        let store = Store::new(Pair { watched: 1, ignored: 0 });
        let (mut inst, renders) = mounted(&store, watched_mapper(), true, Props::new());
        for v in values {
            store.update(|s| Pair { ignored: v, ..s.clone() });
            prop_assert!(!inst.is_update_scheduled());
            prop_assert!(matches!(inst.update().unwrap(), UpdateOutcome::Skipped));
        }
        prop_assert_eq!(renders.get(), 1);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. State-only mapper re-renders iff derived props differ
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn rerender_iff_derived_changed(edits in proptest::collection::vec(edit_strategy(), 1..30)) {
        let store = Store::new(Pair { watched: 0, ignored: 0 });
        let (mut inst, renders) = mounted(&store, watched_mapper(), true, Props::new());
        for edit in &edits {
            let before = store.state().watched;
            apply(&store, edit);
            let changed = store.state().watched != before;
            let expected = renders.get() + usize::from(changed);

            prop_assert_eq!(inst.is_update_scheduled(), changed);
            inst.update().unwrap();
            prop_assert_eq!(renders.get(), expected);
            let derived = inst.derived_props().unwrap();
            prop_assert_eq!(derived.get("watched"), Some(&json!(store.state().watched)));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Impure instances schedule on every notification
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn impure_schedules_every_notification(edits in proptest::collection::vec(edit_strategy(), 1..20)) {
        let store = Store::new(Pair { watched: 0, ignored: 0 });
        let (mut inst, _renders) = mounted(&store, watched_mapper(), false, Props::new());
        for edit in &edits {
            apply(&store, edit);
            prop_assert!(inst.is_update_scheduled());
            prop_assert!(inst.should_update());
            let outcome = inst.update().unwrap();
            prop_assert!(outcome.output().is_some());
            prop_assert!(!inst.is_update_scheduled());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Own props win over derived props
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn own_props_take_precedence(
        own in proptest::collection::btree_map(key_strategy(), any::<i32>(), 0..6),
        watched in -100i64..100,
    ) {
        let store = Store::new(Pair { watched, ignored: 0 });
        let own_props: Props = own.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
        let (inst, _renders) = mounted(&store, watched_mapper(), true, own_props);
        let merged = inst.merged_props().unwrap();

        for (key, value) in &own {
            prop_assert_eq!(merged.get(key), Some(&json!(value)));
        }
        if !own.contains_key("watched") {
            prop_assert_eq!(merged.get("watched"), Some(&json!(watched)));
        }
        prop_assert_eq!(merged.len(), own.len() + usize::from(!own.contains_key("watched")));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Factory mapper runs once per instance
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn factory_runs_once(values in proptest::collection::vec(-3i64..3, 0..15), instances in 1usize..4) {
        let store = Store::new(Pair { watched: 0, ignored: 0 });
        let outer = Rc::new(RefCell::new(0usize));
        let inner = Rc::new(RefCell::new(0usize));
        let (outer_calls, inner_calls) = (Rc::clone(&outer), Rc::clone(&inner));
        let mapper = MapState::factory(move |_: &Pair, _: &Props| {
            *outer_calls.borrow_mut() += 1;
            let inner_calls = Rc::clone(&inner_calls);
            Selector::from_state(move |s: &Pair| {
                *inner_calls.borrow_mut() += 1;
                json!({ "watched": s.watched })
            })
        });
        let mut live: Vec<_> = (0..instances)
            .map(|_| mounted(&store, mapper.clone(), true, Props::new()).0)
            .collect();
        for v in values {
            store.update(|s| Pair { watched: v, ..s.clone() });
            for inst in &mut live {
                inst.update().unwrap();
            }
        }
        prop_assert_eq!(*outer.borrow(), instances);
        prop_assert!(*inner.borrow() >= instances);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Subscription happens at most once
// ═════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
enum Hook {
    Mount,
    Unmount,
}

proptest! {
    #[test]
    fn subscription_is_idempotent(hooks in proptest::collection::vec(
        prop_oneof![Just(Hook::Mount), Just(Hook::Unmount)], 1..20)
    ) {
        let store = Store::new(Pair { watched: 0, ignored: 0 });
        let mut inst = connect(Some(watched_mapper()), options(true))
            .wrap(Counting::default)
            .construct(&Scope::root(), Some(StoreHandle::new(store.clone())), Props::new())
            .unwrap();
        let mut subscribed = false;
        for hook in hooks {
            match hook {
                Hook::Mount => {
                    inst.mount();
                    subscribed = true;
                }
                Hook::Unmount => {
                    inst.unmount();
                    subscribed = false;
                }
            }
            prop_assert_eq!(inst.is_subscribed(), subscribed);
            prop_assert_eq!(store.listener_count(), usize::from(subscribed));
        }
        drop(inst);
        prop_assert_eq!(store.listener_count(), 0);
    }
}
