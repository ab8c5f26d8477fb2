//! Integration tests for sprig.
//!
//! These tests exercise the public API from outside the crate, verifying that
//! engines, plugins, backends, the hub and the testing helpers work together.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use sprig::backend::{CanvasBackend, DomBackend, Mutation, SsrBackend};
use sprig::event::Event;
use sprig::hub::message::{Custom, Message, Refresh};
use sprig::reactive::{batch, create_effect, create_signal};
use sprig::router::{routes, Params, Router, RouterPlugin, Routes};
use sprig::testing::{display_list_to_string, engine_html, render_to_string, Pilot};
use sprig::{
    builder, ConfigError, Engine, EngineConfig, Hub, HubConfig, HubError, RenderError, Schedule,
};

fn ssr() -> Engine {
    Engine::builder(SsrBackend::new()).build().unwrap()
}

fn ssr_html(engine: &Engine) -> String {
    engine
        .with_backend(|b: &SsrBackend| b.html().to_string())
        .unwrap()
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

#[test]
fn test_refresh_n_times_keeps_only_last_build() {
    let engine = Engine::builder(DomBackend::new()).build().unwrap();
    let slot = engine
        .mount_with(|s| {
            s.element("div", |s| s.on("click", |_| {}).map(drop))?;
            Ok(())
        })
        .unwrap();
    let baseline_nodes = engine.with_dom(|dom| dom.len());

    for n in 0..5 {
        slot.refresh_with(move |s| {
            for i in 0..=n {
                s.element("item", move |s| {
                    s.on("click", |_| {})?;
                    s.text(i.to_string())
                })?;
            }
            Ok(())
        })
        .unwrap();
    }

    engine.with_dom(|dom| {
        // Five items with a text child each, replacing one div.
        assert_eq!(dom.len(), baseline_nodes - 1 + 10);
        assert_eq!(dom.listener_count(), 5);
        assert_eq!(dom.query_by_tag("item").len(), 5);
        assert!(dom.query_by_tag("div").is_empty());
    });
}

#[test]
fn test_refresh_runs_unmount_callbacks_child_first_newest_first() {
    let engine = ssr();
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_c = log.clone();
    let slot = engine
        .mount_with(move |s| {
            let outer = log_c.clone();
            s.on_unmount(move || outer.borrow_mut().push("own-1"));
            let inner = log_c.clone();
            s.element("section", move |s| {
                let inner = inner.clone();
                s.on_unmount(move || inner.borrow_mut().push("child"));
                Ok(())
            })?;
            let outer = log_c.clone();
            s.on_unmount(move || outer.borrow_mut().push("own-2"));
            Ok(())
        })
        .unwrap();
    slot.refresh_with(|_| Ok(())).unwrap();
    assert_eq!(*log.borrow(), vec!["child", "own-2", "own-1"]);
}

#[test]
fn test_disposed_slot_errors() {
    let engine = ssr();
    let slot = engine.mount_with(|s| s.text("x")).unwrap();
    slot.unmount().unwrap();
    assert!(!slot.is_alive());
    assert_eq!(slot.rerender(), Err(RenderError::SlotDisposed));
    assert_eq!(slot.schedule_refresh(), Err(RenderError::SlotDisposed));
}

#[test]
fn test_reentrant_refresh_rejected() {
    let engine = ssr();
    let seen = Rc::new(RefCell::new(None));
    let seen_c = seen.clone();
    engine
        .mount_with(move |s| {
            let me = s.slot();
            *seen_c.borrow_mut() = Some(me.rerender());
            Ok(())
        })
        .unwrap();
    assert_eq!(*seen.borrow(), Some(Err(RenderError::Reentrant)));
}

#[test]
fn test_refresh_from_unmount_callback_rejected() {
    let engine = ssr();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_c = seen.clone();
    let slot = engine
        .mount_with(move |s| {
            let me = s.slot();
            let seen_c = seen_c.clone();
            s.element("b", move |s| {
                let (me, seen_c) = (me.clone(), seen_c.clone());
                s.on_unmount(move || seen_c.borrow_mut().push(me.rerender()));
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
    assert_eq!(engine.slot_count(), 2);

    for _ in 0..3 {
        slot.rerender().unwrap();
        assert_eq!(engine.slot_count(), 2);
    }
    assert_eq!(*seen.borrow(), vec![Err(RenderError::Reentrant); 3]);
    assert_eq!(ssr_html(&engine), "<b></b>");
}

#[test]
fn test_effects_created_in_builder_follow_their_slot() {
    let engine = ssr();
    let (count, set_count) = create_signal(0);
    let runs = Rc::new(Cell::new(0));
    let runs_c = runs.clone();
    let slot = engine
        .mount_with(move |s| {
            let runs_c = runs_c.clone();
            create_effect(move || {
                count.get();
                runs_c.set(runs_c.get() + 1);
            });
            s.text("x")
        })
        .unwrap();
    for _ in 0..3 {
        slot.rerender().unwrap();
    }
    assert_eq!(runs.get(), 4);

    runs.set(0);
    set_count.set(1);
    assert_eq!(runs.get(), 1);

    slot.unmount().unwrap();
    set_count.set(2);
    assert_eq!(runs.get(), 1);
}

// ---------------------------------------------------------------------------
// Plugins and configuration
// ---------------------------------------------------------------------------

#[test]
fn test_unclaimed_tag_tears_down_partial_mount() {
    let engine = Engine::builder(DomBackend::new()).build().unwrap();
    let before = engine.with_dom(|dom| dom.len());
    let err = engine
        .mount_with(|s| {
            s.element("div", |s| s.text("partial"))?;
            s.request(sprig::Request::custom("video", ())).map(drop)
        })
        .unwrap_err();
    assert_eq!(err, RenderError::UnclaimedRequest { tag: "video".into() });
    assert_eq!(engine.with_dom(|dom| dom.len()), before);
    assert_eq!(engine.slot_count(), 0);
}

#[test]
fn test_router_needs_context_and_reactive() {
    let err = Engine::builder(SsrBackend::new())
        .without_default_plugins()
        .plugin(RouterPlugin)
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingDependency { .. }));

    let engine = Engine::builder(SsrBackend::new())
        .plugin(RouterPlugin)
        .build()
        .unwrap();
    let names = engine.plugin_names();
    let pos = |name: &str| names.iter().position(|n| *n == name).unwrap();
    assert!(pos("reactive") < pos("router"));
    assert!(pos("core") < pos("reactive"));
}

#[test]
fn test_boundary_and_context_compose() {
    struct Locale(&'static str);
    let html = render_to_string(|s| {
        s.provide(Locale("fr"))?;
        s.boundary(
            |s| {
                let locale = s.inject::<Locale>()?.map_or("?", |l| l.0);
                s.element("p", move |s| s.text(locale))?;
                Err(RenderError::component("late failure"))
            },
            |s, err| {
                let locale = s.inject::<Locale>()?.map_or("?", |l| l.0);
                s.text(format!("[{locale}] {err}"))
            },
        )?;
        Ok(())
    })
    .unwrap();
    assert_eq!(html, "[fr] late failure");
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

#[test]
fn test_microtask_writes_coalesce_into_one_refresh() {
    let engine = Engine::builder(DomBackend::new()).build().unwrap();
    let (value, set_value) = create_signal(0);
    let builds = Rc::new(Cell::new(0));
    let builds_c = builds.clone();
    engine
        .mount_with(move |s| {
            let builds_c = builds_c.clone();
            s.reactive(move |s| {
                builds_c.set(builds_c.get() + 1);
                s.text(value.get().to_string())
            })?;
            Ok(())
        })
        .unwrap();
    engine.flush();

    for n in 1..=10 {
        set_value.set(n);
    }
    let stats = engine.flush();
    assert_eq!(stats.refreshes, 1);
    assert_eq!(builds.get(), 2);
    assert_eq!(engine_html(&engine), "10");
}

#[test]
fn test_sync_engine_batch() {
    let engine = ssr();
    let (a, set_a) = create_signal(1);
    let (b, set_b) = create_signal(1);
    engine
        .mount_with(move |s| {
            s.reactive(move |s| s.text((a.get() * b.get()).to_string()))?;
            Ok(())
        })
        .unwrap();
    batch(|| {
        set_a.set(6);
        set_b.set(7);
    });
    assert_eq!(ssr_html(&engine), "42");
}

#[test]
fn test_pause_defers_and_resume_applies_in_order() {
    let engine = Engine::builder(DomBackend::new()).build().unwrap();
    let order = Rc::new(RefCell::new(Vec::new()));
    let mut setters = Vec::new();
    for name in ["first", "second", "third"] {
        let (sig, set) = create_signal(0);
        setters.push(set);
        let order_c = order.clone();
        engine
            .mount_with(move |s| {
                let order_c = order_c.clone();
                s.reactive(move |s| {
                    if sig.get() > 0 {
                        order_c.borrow_mut().push(name);
                    }
                    s.text(name)
                })?;
                Ok(())
            })
            .unwrap();
    }
    engine.flush();

    engine.pause();
    setters[2].set(1);
    setters[0].set(1);
    setters[1].set(1);
    assert_eq!(engine.flush(), Default::default());
    assert!(order.borrow().is_empty());
    assert!(engine.needs_flush());

    engine.resume();
    assert_eq!(*order.borrow(), vec!["third", "first", "second"]);
    assert!(!engine.needs_flush());
}

#[test]
fn test_flush_hooks_and_error_hook() {
    let engine = Engine::builder(DomBackend::new()).build().unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    let l = log.clone();
    engine.on_before_flush(move |_| l.borrow_mut().push("before".to_string()));
    let l = log.clone();
    engine.on_flush(move |_| l.borrow_mut().push("after".to_string()));
    let l = log.clone();
    engine.on_error(move |e| l.borrow_mut().push(format!("error: {e}")));

    let (fail, set_fail) = create_signal(false);
    engine
        .mount_with(move |s| {
            s.reactive(move |s| {
                if fail.get() {
                    return Err(RenderError::component("bad state"));
                }
                s.text("fine")
            })?;
            s.reactive(|s| s.text("sibling"))?;
            Ok(())
        })
        .unwrap();
    engine.flush();
    log.borrow_mut().clear();

    set_fail.set(true);
    let stats = engine.flush();
    assert_eq!(stats.errors, 1);
    assert_eq!(*log.borrow(), vec!["before", "error: bad state", "after"]);
    assert_eq!(engine_html(&engine), "sibling");
}

#[test]
fn test_schedule_override() {
    let engine = Engine::builder(SsrBackend::new())
        .config(EngineConfig::new().with_schedule(Schedule::Microtask))
        .build()
        .unwrap();
    assert_eq!(engine.schedule(), Schedule::Microtask);
    engine.mount_with(|s| s.text("later")).unwrap();
    assert_eq!(ssr_html(&engine), "");
    engine.flush();
    assert_eq!(ssr_html(&engine), "later");
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

struct Increment(u32);

impl Message for Increment {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn message_name(&self) -> &str {
        "Increment"
    }
}

#[test]
fn test_message_to_paused_engine_delivered_once_after_resume() {
    let hub = Hub::new();
    let engine = Engine::builder(DomBackend::new()).id("counter").build().unwrap();
    hub.register(&engine).unwrap();
    let (count, set_count) = create_signal(0_u32);
    engine.on("Increment", move |env, _| {
        if let Some(Increment(by)) = env.downcast_ref::<Increment>() {
            set_count.update(|n| *n += by);
        }
    });
    engine
        .mount_with(move |s| {
            s.reactive(move |s| s.text(count.get().to_string()))?;
            Ok(())
        })
        .unwrap();
    hub.run_microtasks();

    engine.pause();
    hub.dispatch("counter", Increment(5)).unwrap();
    hub.run_microtasks();
    hub.tick_frame();
    assert_eq!(count.get_untracked(), 0);

    engine.resume();
    assert_eq!(count.get_untracked(), 5);
    assert_eq!(engine_html(&engine), "5");

    hub.flush_all();
    hub.run_microtasks();
    assert_eq!(count.get_untracked(), 5);
}

#[test]
fn test_refresh_message_rebuilds_roots() {
    let hub = Hub::new();
    let engine = Engine::builder(DomBackend::new()).id("main").build().unwrap();
    hub.register(&engine).unwrap();
    let builds = Rc::new(Cell::new(0));
    let b = builds.clone();
    engine
        .mount_with(move |s| {
            b.set(b.get() + 1);
            s.text("x")
        })
        .unwrap();
    hub.dispatch("main", Refresh).unwrap();
    hub.run_microtasks();
    assert_eq!(builds.get(), 2);
}

#[test]
fn test_cross_engine_messages() {
    let hub = Hub::new();
    let page = Engine::builder(DomBackend::new()).id("page").build().unwrap();
    let overlay = Engine::builder(CanvasBackend::new()).id("overlay").build().unwrap();
    hub.register(&page).unwrap();
    hub.register(&overlay).unwrap();
    assert_eq!(hub.register(&page), Err(HubError::DuplicateEngine("page".into())));

    let (label, set_label) = create_signal(String::from("idle"));
    overlay.on("status", move |env, _| set_label.set(format!("from {}", env.sender.as_deref().unwrap_or("?"))));
    overlay
        .mount_with(move |s| {
            s.reactive(move |s| s.text(label.get()))?;
            Ok(())
        })
        .unwrap();

    page.dispatch("overlay", Custom::new("status")).unwrap();
    assert_eq!(page.dispatch("ghost", Custom::new("status")), Err(HubError::UnknownEngine("ghost".into())));

    // Microtasks alone do not reach the animation-frame engine.
    hub.run_microtasks();
    assert_eq!(label.get_untracked(), "idle");
    hub.tick_frame();
    assert_eq!(label.get_untracked(), "from page");
    let painted = overlay
        .with_backend(|b: &CanvasBackend| display_list_to_string(b.display_list()))
        .unwrap();
    assert_eq!(painted, "text 0,0 \"from page\" black");
}

#[test]
fn test_hub_drive_paints_frames() {
    let hub = Hub::with_config(HubConfig::new().with_frame_interval(Duration::from_millis(1)));
    let canvas = Engine::builder(CanvasBackend::new()).id("canvas").build().unwrap();
    hub.register(&canvas).unwrap();
    let (x, set_x) = create_signal(0);
    canvas
        .mount_with(move |s| {
            s.reactive(move |s| {
                s.element("rect", move |s| {
                    s.attr("x", x.get())?;
                    s.attr("width", 10)?;
                    s.attr("height", 10)?;
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

    tokio_test::block_on(hub.drive(2));
    set_x.set(30);
    tokio_test::block_on(hub.drive(1));

    let painted = canvas
        .with_backend(|b: &CanvasBackend| (b.paints(), display_list_to_string(b.display_list())))
        .unwrap();
    assert_eq!(painted, (2, "rect 30,0 10x10 black".to_string()));
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[test]
fn test_canvas_click_routes_through_hit_test() {
    let engine = Engine::builder(CanvasBackend::new()).build().unwrap();
    let clicks = Rc::new(RefCell::new(Vec::new()));
    let c = clicks.clone();
    engine
        .mount_with(move |s| {
            let outer = c.clone();
            let inner = c.clone();
            s.element("rect", move |s| {
                s.attr("width", 200)?;
                s.attr("height", 200)?;
                let outer = outer.clone();
                s.on("click", move |_| outer.borrow_mut().push("panel"))?;
                let inner = inner.clone();
                s.element("rect", move |s| {
                    s.attr("x", 50)?;
                    s.attr("y", 50)?;
                    s.attr("width", 20)?;
                    s.attr("height", 20)?;
                    let inner = inner.clone();
                    s.on("click", move |e: &mut Event| {
                        inner.borrow_mut().push("button");
                        if e.position.is_some_and(|p| p.x > 60.0) {
                            e.stop_propagation();
                        }
                    })?;
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
    engine.flush();

    assert!(engine.dispatch_at(sprig::geometry::Point::new(55.0, 55.0), Event::new("click")));
    assert!(engine.dispatch_at(sprig::geometry::Point::new(65.0, 55.0), Event::new("click")));
    assert!(engine.dispatch_at(sprig::geometry::Point::new(5.0, 5.0), Event::new("click")));
    assert!(!engine.dispatch_at(sprig::geometry::Point::new(500.0, 5.0), Event::new("click")));
    assert_eq!(*clicks.borrow(), vec!["button", "panel", "button", "panel"]);
}

// ---------------------------------------------------------------------------
// Portals
// ---------------------------------------------------------------------------

#[test]
fn test_portal_torn_down_with_owner() {
    let engine = ssr();
    let layer = engine.create_layer();
    let (open, set_open) = create_signal(true);
    engine
        .mount_with(move |s| {
            s.element("main", |s| s.text("page"))?;
            s.reactive(move |s| {
                if open.get() {
                    s.portal(layer, |s| {
                        s.element("dialog", |s| s.text("hello"))?;
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
    assert_eq!(ssr_html(&engine), "<main>page</main><dialog>hello</dialog>");

    set_open.set(false);
    assert_eq!(engine.with_dom(|dom| dom.children(layer).len()), 0);
    assert_eq!(ssr_html(&engine), "<main>page</main>");
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

#[test]
fn test_dom_patch_stream() {
    let engine = Engine::builder(DomBackend::new()).build().unwrap();
    engine
        .mount_with(|s| {
            s.element("a", |s| {
                s.attr("href", "/")?;
                s.on("click", |_| {})?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
    assert!(engine.with_backend(|b: &DomBackend| b.patches().is_empty()).unwrap());
    engine.flush();
    let patches = engine
        .with_backend_mut(|b: &mut DomBackend| b.take_patches())
        .unwrap();
    let kinds: Vec<&str> = patches
        .iter()
        .map(|p| match p.mutation {
            Mutation::Create { .. } => "create",
            Mutation::SetAttribute { .. } => "set",
            Mutation::RemoveAttribute { .. } => "unset",
            Mutation::AddListener { .. } => "listen",
            Mutation::RemoveListener { .. } => "unlisten",
            Mutation::Remove { .. } => "remove",
        })
        .collect();
    // Root, mount anchor, <a>, then its attribute and listener.
    assert_eq!(kinds, vec!["create", "create", "create", "set", "listen"]);
    assert!(patches.iter().all(|p| p.frame == 1));
}

#[test]
fn test_ssr_snapshot() {
    let html = render_to_string(|s| {
        s.element("form", |s| {
            s.attr("action", "/search?q=a&b")?;
            s.element("label", |s| s.text("Query <required>"))?;
            s.element("input", |s| {
                s.attr("name", "q")?;
                s.attr("required", true)?;
                s.attr("autofocus", false)?;
                Ok(())
            })?;
            s.element("button", |s| s.text("Go"))?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();
    insta::assert_snapshot!(html, @r###"<form action="/search?q=a&amp;b"><label>Query &lt;required&gt;</label><input name="q" required><button>Go</button></form>"###);
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[test]
fn test_router_with_pilot() {
    let router = Router::new("/");
    let pilot = Pilot::new(move |s| {
        s.element("nav", move |s| {
            s.element("a", move |s| {
                s.attr("id", "to-user")?;
                s.on("click", move |_| router.navigate("/users/7"))?;
                s.text("user")
            })?;
            Ok(())
        })?;
        let table = Routes::new()
            .route("/", |s| s.text("home"))
            .route("/users/:id", |s| {
                let params = s.inject::<Params>()?.unwrap_or_default();
                s.element("h1", move |s| {
                    s.attr("id", "title")?;
                    s.text(format!("User {}", params.get("id").unwrap_or("?")))
                })?;
                Ok(())
            })
            .fallback(|s| s.text("not found"));
        routes(s, router, table)?;
        Ok(())
    })
    .unwrap();

    assert!(pilot.html().ends_with("home"));
    assert!(pilot.click("to-user"));
    assert_eq!(pilot.text_of("title").as_deref(), Some("User 7"));
    router.navigate("/elsewhere");
    pilot.settle();
    assert!(pilot.html().ends_with("not found"));
}

// ---------------------------------------------------------------------------
// Builders and the view! macro
// ---------------------------------------------------------------------------

#[test]
fn test_extend_with_request_iterator() {
    let html = render_to_string(|s| {
        let items = ["a", "b", "c"].map(sprig::Request::text);
        s.extend(items)?;
        Ok(())
    })
    .unwrap();
    assert_eq!(html, "abc");
}

#[test]
fn test_mount_shared_builder() {
    let engine = ssr();
    let item = builder(|s| s.element("li", |s| s.text("x")).map(drop));
    let item_c = item.clone();
    engine
        .mount_with(move |s| {
            s.element("ul", {
                let item_c = item_c.clone();
                move |s| {
                    s.render(&item_c)?;
                    s.render(&item_c)
                }
            })?;
            Ok(())
        })
        .unwrap();
    engine.mount(item).unwrap();
    assert_eq!(ssr_html(&engine), "<ul><li>x</li><li>x</li></ul><li>x</li>");
}

#[cfg(feature = "macros")]
#[test]
fn test_view_macro_renders() {
    use sprig::view;

    let engine = ssr();
    let (count, set_count) = create_signal(1);
    let label = "Count";
    engine
        .mount(view! {
            <div class="counter" data-kind={"demo"}>
                <button on:click={move |_| set_count.update(|n| *n += 1)} disabled>"+"</button>
                <span>{label} ": " {count.get_untracked()}</span>
            </div>
        })
        .unwrap();
    insta::assert_snapshot!(ssr_html(&engine), @r###"<div class="counter" data-kind="demo"><button disabled>+</button><span>Count: 1</span></div>"###);
}

#[cfg(feature = "macros")]
#[test]
fn test_view_macro_owned_captures() {
    use sprig::view;

    let name = String::from("Ada & co");
    let cls = String::from("card");
    let clicks = Rc::new(Cell::new(0));
    let on_click = {
        let clicks = clicks.clone();
        move |_: &mut Event| clicks.set(clicks.get() + 1)
    };
    let engine = ssr();
    let slot = engine
        .mount(view! {
            <div class={cls} title={name.clone()}>
                <b on:click={on_click.clone()}>{name}</b>
                <i>{cls.len()}</i>
            </div>
        })
        .unwrap();
    slot.rerender().unwrap();
    insta::assert_snapshot!(ssr_html(&engine), @r###"<div class="card" title="Ada &amp; co"><b>Ada &amp; co</b><i>4</i></div>"###);

    let b = engine.with_dom(|dom| dom.query_by_tag("b"))[0];
    engine.dispatch_event(b, Event::new("click"));
    assert_eq!(clicks.get(), 1);
}
