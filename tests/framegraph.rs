//! End-to-end frame graph tests.
//!
//! A recording driver and allocator turn every acquire, release, execution
//! and flush into an event log, so the tests can assert on culling results,
//! execution order and exact resource lifetimes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use framegraph::{
    Builder, Driver, Engine, FrameGraph, FrameGraphId, FrameGraphPassResources, FrameGraphTexture,
    PooledAllocator, RenderTargetAttachments, RenderTargetDescriptor, RenderTargetHandle,
    RenderTargetSpec, ResourceAllocator, ResourceHints, ResourceType, SharedAllocator,
    TargetBufferFlags, TextureDescriptor, TextureFormat, TextureHandle, TextureUsage,
};

type EventLog = Arc<Mutex<Vec<String>>>;

fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn events(log: &EventLog) -> Vec<String> {
    log.lock().clone()
}

fn position(events: &[String], needle: &str) -> usize {
    events
        .iter()
        .position(|event| event == needle)
        .unwrap_or_else(|| panic!("event `{needle}` not found in {events:?}"))
}

fn count_prefixed(events: &[String], prefix: &str) -> usize {
    events.iter().filter(|event| event.starts_with(prefix)).count()
}

// ---------------------------------------------------------------------------
// Recording collaborators
// ---------------------------------------------------------------------------

struct TestDriver {
    next: u64,
    log: EventLog,
}

impl TestDriver {
    fn new(log: EventLog) -> Self {
        Self { next: 0, log }
    }
}

impl Driver for TestDriver {
    fn create_texture(&mut self, name: &str, _desc: &TextureDescriptor) -> TextureHandle {
        self.next += 1;
        self.log.lock().push(format!("create_texture:{name}"));
        TextureHandle(self.next)
    }

    fn destroy_texture(&mut self, _texture: TextureHandle) {
        self.log.lock().push("destroy_texture".to_string());
    }

    fn create_render_target(&mut self, name: &str, _spec: &RenderTargetSpec) -> RenderTargetHandle {
        self.next += 1;
        self.log.lock().push(format!("create_render_target:{name}"));
        RenderTargetHandle(self.next)
    }

    fn destroy_render_target(&mut self, _target: RenderTargetHandle) {
        self.log.lock().push("destroy_render_target".to_string());
    }

    fn flush(&mut self) {
        self.log.lock().push("flush".to_string());
    }
}

/// Non-pooling allocator that records every call, by resource name.
struct RecordingAllocator {
    log: EventLog,
    names: HashMap<TextureHandle, String>,
}

impl ResourceAllocator for RecordingAllocator {
    fn acquire_texture(
        &mut self,
        driver: &mut dyn Driver,
        name: &str,
        desc: &TextureDescriptor,
    ) -> TextureHandle {
        self.log.lock().push(format!("acquire:{name}"));
        if desc.usage.contains(TextureUsage::TEXTURE_BINDING) {
            self.log.lock().push(format!("sampled:{name}"));
        }
        let handle = driver.create_texture(name, desc);
        self.names.insert(handle, name.to_string());
        handle
    }

    fn release_texture(
        &mut self,
        driver: &mut dyn Driver,
        _desc: &TextureDescriptor,
        texture: TextureHandle,
    ) {
        let name = self.names.remove(&texture).expect("released unknown texture");
        self.log.lock().push(format!("release:{name}"));
        driver.destroy_texture(texture);
    }

    fn acquire_render_target(
        &mut self,
        driver: &mut dyn Driver,
        name: &str,
        spec: &RenderTargetSpec,
    ) -> RenderTargetHandle {
        self.log.lock().push(format!("acquire_rt:{name}"));
        driver.create_render_target(name, spec)
    }

    fn release_render_target(
        &mut self,
        driver: &mut dyn Driver,
        _spec: &RenderTargetSpec,
        target: RenderTargetHandle,
    ) {
        self.log.lock().push("release_rt".to_string());
        driver.destroy_render_target(target);
    }
}

fn recording_allocator(log: EventLog) -> SharedAllocator {
    Arc::new(Mutex::new(RecordingAllocator {
        log,
        names: HashMap::new(),
    }))
}

fn color_desc(size: u32) -> TextureDescriptor {
    TextureDescriptor::new_2d(
        size,
        size,
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
}

#[derive(Default)]
struct TargetData {
    out: Option<FrameGraphId<FrameGraphTexture>>,
}

// ---------------------------------------------------------------------------
// Culling
// ---------------------------------------------------------------------------

#[test]
fn test_single_pass_presented() {
    // One pass writes `x`, which is presented: the pass survives, its
    // resource is acquired before and released after the execution.
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    let mut out = None;
    let exec_log = log.clone();
    fg.add_pass(
        "producer",
        |builder: &mut Builder, _: &mut ()| {
            let x = builder.create_texture("x", color_desc(64));
            out = Some(builder.write(x));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {
            exec_log.lock().push("exec:producer".to_string());
        },
    );
    fg.present(out.unwrap());
    fg.compile().execute(&mut driver);

    let events = events(&log);
    assert_eq!(count_prefixed(&events, "exec:producer"), 1);
    let acquire = position(&events, "acquire:x");
    let exec = position(&events, "exec:producer");
    let flush = position(&events, "flush");
    let release = position(&events, "release:x");
    assert!(acquire < exec);
    assert!(exec < flush);
    assert!(flush < release);
}

#[test]
fn test_linear_chain_with_culling() {
    // A writes x
    // B reads x, writes y     (y presented)
    // C reads x, writes z     (z unobserved -> C culled)
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    let mut x_out = None;
    let mut y_out = None;

    let exec_log = log.clone();
    let a = fg.add_pass(
        "a",
        |builder: &mut Builder, _: &mut ()| {
            let x = builder.create_texture("x", color_desc(64));
            x_out = Some(builder.write(x));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {
            exec_log.lock().push("exec:a".to_string());
        },
    );

    let exec_log = log.clone();
    let b = fg.add_pass(
        "b",
        |builder: &mut Builder, _: &mut ()| {
            builder.read(x_out.unwrap());
            let y = builder.create_texture("y", color_desc(64));
            y_out = Some(builder.write(y));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {
            exec_log.lock().push("exec:b".to_string());
        },
    );

    let exec_log = log.clone();
    let c = fg.add_pass(
        "c",
        |builder: &mut Builder, _: &mut ()| {
            builder.read(x_out.unwrap());
            let z = builder.create_texture("z", color_desc(64));
            builder.write(z);
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {
            exec_log.lock().push("exec:c".to_string());
        },
    );

    fg.present(y_out.unwrap());
    fg.compile();

    assert!(!fg.is_pass_culled(a));
    assert!(!fg.is_pass_culled(b));
    assert!(fg.is_pass_culled(c));

    fg.execute(&mut driver);

    let events = events(&log);
    assert_eq!(count_prefixed(&events, "exec:a"), 1);
    assert_eq!(count_prefixed(&events, "exec:b"), 1);
    assert_eq!(count_prefixed(&events, "exec:c"), 0);
    // x's last use is B, so it is released right after B runs; z is never
    // acquired at all.
    assert!(position(&events, "exec:b") < position(&events, "release:x"));
    assert_eq!(count_prefixed(&events, "acquire:z"), 0);
}

#[test]
fn test_side_effect_pass_survives() {
    // A pass that writes nothing and is referenced by nothing survives
    // culling when marked as a side effect.
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    let exec_log = log.clone();
    let p = fg.add_pass(
        "debug_overlay",
        |builder: &mut Builder, _: &mut ()| {
            builder.side_effect();
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {
            exec_log.lock().push("exec:debug_overlay".to_string());
        },
    );

    fg.compile();
    assert!(!fg.is_pass_culled(p));
    fg.execute(&mut driver);

    assert_eq!(count_prefixed(&events(&log), "exec:debug_overlay"), 1);
}

#[test]
fn test_write_to_imported_is_side_effect() {
    // Writing an imported resource implies a side effect: the pass survives
    // even though nothing downstream references it.
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    let backbuffer = fg.import(
        "backbuffer",
        color_desc(256),
        FrameGraphTexture {
            handle: TextureHandle(77),
        },
    );

    let exec_log = log.clone();
    let p = fg.add_pass(
        "blit",
        |builder: &mut Builder, _: &mut ()| {
            builder.write(backbuffer);
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {
            exec_log.lock().push("exec:blit".to_string());
        },
    );

    fg.compile();
    assert!(!fg.is_pass_culled(p));
    fg.execute(&mut driver);

    let events = events(&log);
    assert_eq!(count_prefixed(&events, "exec:blit"), 1);
    // Imported resources never touch the allocator.
    assert_eq!(count_prefixed(&events, "acquire:backbuffer"), 0);
    assert_eq!(count_prefixed(&events, "release:backbuffer"), 0);
}

// ---------------------------------------------------------------------------
// Ordering and lifetimes
// ---------------------------------------------------------------------------

#[test]
fn test_survivors_execute_in_registration_order() {
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    for name in ["first", "second", "third"] {
        let exec_log = log.clone();
        fg.add_pass(
            name,
            |builder: &mut Builder, _: &mut ()| {
                builder.side_effect();
            },
            move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {
                exec_log.lock().push(format!("exec:{name}"));
            },
        );
    }

    fg.compile().execute(&mut driver);

    let events = events(&log);
    assert!(position(&events, "exec:first") < position(&events, "exec:second"));
    assert!(position(&events, "exec:second") < position(&events, "exec:third"));
}

#[test]
fn test_lifetimes_are_tight() {
    // A writes x; B reads x, writes y; C reads y, writes z; z presented.
    // Each resource must be acquired at its first use and released at the
    // end of its last, never in between.
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    let mut x_out = None;
    let mut y_out = None;
    let mut z_out = None;

    let exec_log = log.clone();
    fg.add_pass(
        "a",
        |builder: &mut Builder, _: &mut ()| {
            let x = builder.create_texture("x", color_desc(64));
            x_out = Some(builder.write(x));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {
            exec_log.lock().push("exec:a".to_string());
        },
    );

    let exec_log = log.clone();
    fg.add_pass(
        "b",
        |builder: &mut Builder, _: &mut ()| {
            builder.read(x_out.unwrap());
            let y = builder.create_texture("y", color_desc(64));
            y_out = Some(builder.write(y));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {
            exec_log.lock().push("exec:b".to_string());
        },
    );

    let exec_log = log.clone();
    fg.add_pass(
        "c",
        |builder: &mut Builder, _: &mut ()| {
            builder.read(y_out.unwrap());
            let z = builder.create_texture("z", color_desc(64));
            z_out = Some(builder.write(z));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {
            exec_log.lock().push("exec:c".to_string());
        },
    );

    fg.present(z_out.unwrap());
    fg.compile().execute(&mut driver);

    let events = events(&log);
    // x lives [a, b]
    assert!(position(&events, "acquire:x") < position(&events, "exec:a"));
    assert!(position(&events, "exec:b") < position(&events, "release:x"));
    assert!(position(&events, "release:x") < position(&events, "exec:c"));
    // y lives [b, c]
    assert!(position(&events, "exec:a") < position(&events, "acquire:y"));
    assert!(position(&events, "acquire:y") < position(&events, "exec:b"));
    assert!(position(&events, "exec:c") < position(&events, "release:y"));
    // one driver flush per executed pass
    assert_eq!(count_prefixed(&events, "flush"), 3);
}

#[test]
fn test_pooled_allocator_reuses_across_graphs() {
    // Two frames sharing one pooled allocator: the second frame's texture
    // comes out of the pool, so the driver only ever creates one.
    let log = new_log();
    let allocator = PooledAllocator::shared();
    let mut driver = TestDriver::new(log.clone());

    for _ in 0..2 {
        let mut fg = FrameGraph::new(allocator.clone());
        let mut out = None;
        fg.add_pass(
            "producer",
            |builder: &mut Builder, _: &mut ()| {
                let x = builder.create_texture("x", color_desc(128));
                out = Some(builder.write(x));
            },
            move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
        );
        fg.present(out.unwrap());
        fg.compile().execute(&mut driver);
    }

    assert_eq!(count_prefixed(&events(&log), "create_texture:x"), 1);
}

// ---------------------------------------------------------------------------
// move_resource
// ---------------------------------------------------------------------------

#[test]
fn test_move_aliases_history() {
    // A writes x; B reads x and produces the next version; C writes y.
    // After move(x_latest -> y) and present(y): y resolves to x's entry,
    // C's write is neutralized and C is culled, while A and B survive.
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    let mut x_latest = None;
    let mut y_out = None;

    let exec_log = log.clone();
    let a = fg.add_pass(
        "a",
        |builder: &mut Builder, _: &mut ()| {
            let x = builder.create_texture("x", color_desc(64));
            x_latest = Some(builder.write(x));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {
            exec_log.lock().push("exec:a".to_string());
        },
    );

    let exec_log = log.clone();
    let b = fg.add_pass(
        "b",
        |builder: &mut Builder, _: &mut ()| {
            let x = x_latest.unwrap();
            builder.read(x);
            x_latest = Some(builder.write(x));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {
            exec_log.lock().push("exec:b".to_string());
        },
    );

    let exec_log = log.clone();
    let c = fg.add_pass(
        "c",
        |builder: &mut Builder, _: &mut ()| {
            let y = builder.create_texture("y", color_desc(64));
            y_out = Some(builder.write(y));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {
            exec_log.lock().push("exec:c".to_string());
        },
    );

    let y = y_out.unwrap();
    fg.move_resource(x_latest.unwrap(), y);
    fg.present(y);
    fg.compile();

    // The presented handle now resolves to x's entry.
    assert_eq!(fg.name_of(y), "x");
    assert!(!fg.is_pass_culled(a));
    assert!(!fg.is_pass_culled(b));
    assert!(fg.is_pass_culled(c));

    fg.execute(&mut driver);

    let events = events(&log);
    assert_eq!(count_prefixed(&events, "exec:a"), 1);
    assert_eq!(count_prefixed(&events, "exec:b"), 1);
    assert_eq!(count_prefixed(&events, "exec:c"), 0);
    assert_eq!(count_prefixed(&events, "acquire:y"), 0);
}

#[test]
fn test_move_invalidates_from_handle() {
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));

    let mut x_out = None;
    let mut y_out = None;
    fg.add_pass(
        "p",
        |builder: &mut Builder, _: &mut ()| {
            let x = builder.create_texture("x", color_desc(64));
            x_out = Some(builder.write(x));
            let y = builder.create_texture("y", color_desc(64));
            y_out = Some(builder.write(y));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
    );

    let from = x_out.unwrap();
    let moved = fg.move_resource(from, y_out.unwrap());
    assert!(!fg.is_valid(from));
    assert!(fg.is_valid(moved));
}

// ---------------------------------------------------------------------------
// Render targets
// ---------------------------------------------------------------------------

#[test]
fn test_render_target_coalescing() {
    // Two passes, each with its own 1024x1024 RGBA target, lifetimes
    // disjoint: they share one concrete render target. Neither boundary
    // between them discards: the second pass reuses the backing.
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    let mut first_out = None;
    let mut second_out = None;

    let a = fg.add_pass(
        "first",
        |builder: &mut Builder, data: &mut TargetData| {
            let t = builder.create_texture("t1", color_desc(1024));
            let out = builder.write(t);
            builder.create_render_target(
                "first_target",
                RenderTargetDescriptor {
                    attachments: RenderTargetAttachments::color(out),
                    samples: 1,
                },
                TargetBufferFlags::NONE,
            );
            data.out = Some(out);
            first_out = Some(out);
        },
        move |resources: &FrameGraphPassResources, data: &TargetData, _driver: &mut dyn Driver| {
            let info = resources.get_render_target(data.out.unwrap());
            assert_eq!(info.params.discard_end, TargetBufferFlags::NONE);
        },
    );

    let b = fg.add_pass(
        "second",
        |builder: &mut Builder, data: &mut TargetData| {
            let t = builder.create_texture("t2", color_desc(1024));
            let out = builder.write(t);
            builder.create_render_target(
                "second_target",
                RenderTargetDescriptor {
                    attachments: RenderTargetAttachments::color(out),
                    samples: 1,
                },
                TargetBufferFlags::NONE,
            );
            data.out = Some(out);
            second_out = Some(out);
        },
        move |resources: &FrameGraphPassResources, data: &TargetData, _driver: &mut dyn Driver| {
            let info = resources.get_render_target(data.out.unwrap());
            assert_eq!(info.params.discard_start, TargetBufferFlags::NONE);
            assert_eq!(info.params.width, 1024);
        },
    );

    fg.present(first_out.unwrap());
    fg.present(second_out.unwrap());
    fg.compile();
    assert!(!fg.is_pass_culled(a));
    assert!(!fg.is_pass_culled(b));
    fg.execute(&mut driver);

    let events = events(&log);
    assert_eq!(count_prefixed(&events, "acquire_rt:"), 1);
    assert_eq!(count_prefixed(&events, "release_rt"), 1);
}

#[test]
fn test_same_resource_targets_share_backing() {
    // Two passes rendering into successive versions of the same texture
    // share one concrete render target, and the interior boundary neither
    // discards at the first pass's end nor at the second pass's start.
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    let mut color_v1 = None;
    let mut color_v2 = None;

    fg.add_pass(
        "base",
        |builder: &mut Builder, data: &mut TargetData| {
            let color = builder.create_texture("color", color_desc(512));
            let out = builder.use_as_render_target(color, TargetBufferFlags::COLOR);
            data.out = Some(out);
            color_v1 = Some(out);
        },
        move |resources: &FrameGraphPassResources, data: &TargetData, _driver: &mut dyn Driver| {
            let info = resources.get_render_target(data.out.unwrap());
            // Cleared, freshly created attachment: fully discardable at start.
            assert!(info.params.discard_start.contains(TargetBufferFlags::COLOR));
            assert_eq!(info.params.discard_end, TargetBufferFlags::NONE);
        },
    );

    fg.add_pass(
        "decals",
        |builder: &mut Builder, data: &mut TargetData| {
            let prev = color_v1.unwrap();
            builder.read_attachment(prev);
            let out = builder.use_as_render_target(prev, TargetBufferFlags::NONE);
            data.out = Some(out);
            color_v2 = Some(out);
        },
        move |resources: &FrameGraphPassResources, data: &TargetData, _driver: &mut dyn Driver| {
            let info = resources.get_render_target(data.out.unwrap());
            assert_eq!(info.params.discard_start, TargetBufferFlags::NONE);
        },
    );

    fg.present(color_v2.unwrap());
    fg.compile().execute(&mut driver);

    let events = events(&log);
    assert_eq!(count_prefixed(&events, "acquire_rt:"), 1);
    assert_eq!(count_prefixed(&events, "acquire:color"), 1);
}

#[test]
fn test_imported_render_target() {
    // An imported render target keeps its caller-declared discard flags and
    // never goes through the allocator.
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    let target = RenderTargetHandle(999);
    let viewport = fg.import_render_target(
        "viewport",
        TextureDescriptor::new_2d(
            1280,
            720,
            TextureFormat::Bgra8Unorm,
            TextureUsage::RENDER_ATTACHMENT,
        ),
        target,
        1280,
        720,
        TargetBufferFlags::COLOR,
        TargetBufferFlags::NONE,
    );

    let mut out = None;
    fg.add_pass(
        "final",
        |builder: &mut Builder, data: &mut TargetData| {
            let written = builder.write(viewport);
            builder.create_render_target(
                "viewport",
                RenderTargetDescriptor {
                    attachments: RenderTargetAttachments::color(written),
                    samples: 1,
                },
                TargetBufferFlags::NONE,
            );
            data.out = Some(written);
            out = Some(written);
        },
        move |resources: &FrameGraphPassResources, data: &TargetData, _driver: &mut dyn Driver| {
            let info = resources.get_render_target(data.out.unwrap());
            assert_eq!(info.target, RenderTargetHandle(999));
            assert_eq!(info.params.discard_start, TargetBufferFlags::COLOR);
            assert_eq!(info.params.discard_end, TargetBufferFlags::NONE);
        },
    );

    fg.present(out.unwrap());
    fg.compile().execute(&mut driver);

    let events = events(&log);
    assert_eq!(count_prefixed(&events, "acquire"), 0);
    assert_eq!(count_prefixed(&events, "release"), 0);
    assert_eq!(count_prefixed(&events, "flush"), 1);
}

#[test]
fn test_presented_attachment_is_not_discarded() {
    // The cohort's last pass may only discard attachments nobody observes
    // afterward; a presented color attachment must be stored.
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    let mut out = None;
    fg.add_pass(
        "scene",
        |builder: &mut Builder, data: &mut TargetData| {
            let color = builder.create_texture("color", color_desc(512));
            let written = builder.use_as_render_target(color, TargetBufferFlags::COLOR);
            data.out = Some(written);
            out = Some(written);
        },
        move |resources: &FrameGraphPassResources, data: &TargetData, _driver: &mut dyn Driver| {
            let info = resources.get_render_target(data.out.unwrap());
            assert_eq!(info.params.discard_end, TargetBufferFlags::NONE);
            assert!(info.params.discard_start.contains(TargetBufferFlags::COLOR));
        },
    );

    fg.present(out.unwrap());
    fg.compile().execute(&mut driver);
}

// ---------------------------------------------------------------------------
// Handles and validation
// ---------------------------------------------------------------------------

#[test]
fn test_write_invalidates_handle() {
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));

    let mut before = None;
    let mut after = None;
    fg.add_pass(
        "p",
        |builder: &mut Builder, _: &mut ()| {
            let x = builder.create_texture("x", color_desc(64));
            before = Some(x);
            after = Some(builder.write(x));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
    );

    assert!(!fg.is_valid(before.unwrap()));
    assert!(fg.is_valid(after.unwrap()));
}

#[test]
fn test_double_write_in_one_pass_is_stable() {
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));

    fg.add_pass(
        "p",
        |builder: &mut Builder, _: &mut ()| {
            let x = builder.create_texture("x", color_desc(64));
            let first = builder.write(x);
            let second = builder.write(first);
            assert_eq!(first, second);
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
    );
}

#[test]
#[should_panic(expected = "invalid frame graph handle")]
fn test_read_of_stale_handle_panics() {
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));

    fg.add_pass(
        "p",
        |builder: &mut Builder, _: &mut ()| {
            let x = builder.create_texture("x", color_desc(64));
            builder.write(x);
            builder.read(x); // stale: x was consumed by the write
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
    );
}

#[test]
#[should_panic(expected = "not read or written")]
fn test_undeclared_attachment_panics() {
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));

    let mut leaked = None;
    fg.add_pass(
        "p",
        |builder: &mut Builder, _: &mut ()| {
            let x = builder.create_texture("x", color_desc(64));
            leaked = Some(builder.write(x));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
    );

    fg.add_pass(
        "q",
        |builder: &mut Builder, _: &mut ()| {
            // Declares a render target over a texture this pass never
            // read or wrote.
            builder.create_render_target(
                "bad",
                RenderTargetDescriptor {
                    attachments: RenderTargetAttachments::color(leaked.unwrap()),
                    samples: 1,
                },
                TargetBufferFlags::NONE,
            );
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
    );
}

#[test]
#[should_panic(expected = "cannot back")]
fn test_depth_format_in_color_slot_panics() {
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));

    fg.add_pass(
        "p",
        |builder: &mut Builder, _: &mut ()| {
            let depth = builder.create_texture(
                "depth",
                TextureDescriptor::new_2d(
                    64,
                    64,
                    TextureFormat::Depth32Float,
                    TextureUsage::RENDER_ATTACHMENT,
                ),
            );
            let written = builder.write(depth);
            builder.create_render_target(
                "bad",
                RenderTargetDescriptor {
                    attachments: RenderTargetAttachments::color(written),
                    samples: 1,
                },
                TargetBufferFlags::NONE,
            );
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
    );
}

#[test]
#[should_panic(expected = "did not declare")]
fn test_undeclared_resource_in_execute_panics() {
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    let mut x_out = None;
    fg.add_pass(
        "a",
        |builder: &mut Builder, _: &mut ()| {
            let x = builder.create_texture("x", color_desc(64));
            x_out = Some(builder.write(x));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
    );

    let stolen = x_out.unwrap();
    let mut out = None;
    fg.add_pass(
        "b",
        |builder: &mut Builder, data: &mut TargetData| {
            // Deliberately does NOT declare `stolen`.
            let y = builder.create_texture("y", color_desc(64));
            let written = builder.write(y);
            data.out = Some(written);
            out = Some(written);
        },
        move |resources: &FrameGraphPassResources, _data: &TargetData, _driver: &mut dyn Driver| {
            resources.get_texture(stolen); // fatal: undeclared
        },
    );

    fg.present(x_out.unwrap());
    fg.present(out.unwrap());
    fg.compile().execute(&mut driver);
}

// ---------------------------------------------------------------------------
// Builder queries and custom resource types
// ---------------------------------------------------------------------------

#[test]
fn test_builder_queries() {
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));

    let mut out = None;
    fg.add_pass(
        "p",
        |builder: &mut Builder, _: &mut ()| {
            let x = builder.create_texture("x", color_desc(64));
            assert_eq!(builder.descriptor(x).width, 64);
            assert_eq!(builder.name_of(x), "x");
            assert_eq!(builder.pass_name(), "p");
            assert!(!builder.is_attachment(x));
            assert_eq!(builder.samples(x), 1);

            let written = builder.use_as_render_target(x, TargetBufferFlags::COLOR);
            assert!(builder.is_attachment(written));
            assert_eq!(builder.render_target_descriptor(written).samples, 1);
            out = Some(written);
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
    );

    let out = out.unwrap();
    assert_eq!(fg.descriptor(out).height, 64);
    assert_eq!(fg.name_of(out), "x");
}

#[derive(Debug, Clone)]
struct TestBufferDesc {
    size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TestBuffer {
    id: u64,
}

impl ResourceType for TestBuffer {
    type Descriptor = TestBufferDesc;

    fn create(
        _name: &str,
        desc: &Self::Descriptor,
        _hints: ResourceHints,
        _allocator: &mut dyn ResourceAllocator,
        _driver: &mut dyn Driver,
    ) -> Self {
        Self { id: desc.size }
    }

    fn destroy(
        self,
        _desc: &Self::Descriptor,
        _hints: ResourceHints,
        _allocator: &mut dyn ResourceAllocator,
        _driver: &mut dyn Driver,
    ) {
    }
}

#[derive(Default)]
struct BufferData {
    buffer: Option<FrameGraphId<TestBuffer>>,
}

#[test]
fn test_custom_resource_type() {
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    let mut out = None;
    fg.add_pass(
        "fill",
        |builder: &mut Builder, data: &mut BufferData| {
            let b = builder.create::<TestBuffer>("lights", TestBufferDesc { size: 4096 });
            let written = builder.write(b);
            data.buffer = Some(written);
            out = Some(written);
        },
        move |resources: &FrameGraphPassResources, data: &BufferData, _driver: &mut dyn Driver| {
            let buffer = resources.get(data.buffer.unwrap());
            assert_eq!(buffer.id, 4096);
        },
    );

    fg.present(out.unwrap());
    fg.compile().execute(&mut driver);
}

#[test]
fn test_attachment_only_read_skips_sampled_usage() {
    // `read_attachment` keeps the sampleable-usage bit off; a plain `read`
    // turns it on.
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    let mut depth_out = None;
    let mut color_out = None;
    fg.add_pass(
        "gbuffer",
        |builder: &mut Builder, _: &mut ()| {
            let depth = builder.create_texture(
                "depth",
                TextureDescriptor::new_2d(
                    256,
                    256,
                    TextureFormat::Depth32Float,
                    TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
                ),
            );
            let color = builder.create_texture("color", color_desc(256));
            depth_out = Some(builder.write(depth));
            color_out = Some(builder.write(color));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
    );

    let mut out = None;
    fg.add_pass(
        "lighting",
        |builder: &mut Builder, _: &mut ()| {
            builder.read_attachment(depth_out.unwrap());
            builder.read(color_out.unwrap());
            let lit = builder.create_texture("lit", color_desc(256));
            out = Some(builder.write(lit));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
    );

    fg.present(out.unwrap());
    fg.compile().execute(&mut driver);

    let events = events(&log);
    assert_eq!(count_prefixed(&events, "sampled:depth"), 0);
    assert_eq!(count_prefixed(&events, "sampled:color"), 1);
}

// ---------------------------------------------------------------------------
// Engine hook, empty graphs, graphviz
// ---------------------------------------------------------------------------

struct TestEngine {
    log: EventLog,
}

impl Engine for TestEngine {
    fn flush(&mut self) {
        self.log.lock().push("engine_flush".to_string());
    }
}

#[test]
fn test_execute_with_engine_pumps_after_each_pass() {
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());
    let mut engine = TestEngine { log: log.clone() };

    for name in ["a", "b"] {
        fg.add_pass(
            name,
            |builder: &mut Builder, _: &mut ()| {
                builder.side_effect();
            },
            move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
        );
    }

    fg.compile().execute_with_engine(&mut engine, &mut driver);

    let events = events(&log);
    assert_eq!(count_prefixed(&events, "engine_flush"), 2);
    // driver flush comes first, then the engine pump
    assert!(position(&events, "flush") < position(&events, "engine_flush"));
}

#[test]
fn test_empty_graph() {
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));
    let mut driver = TestDriver::new(log.clone());

    fg.compile().execute(&mut driver);
    assert!(events(&log).is_empty());
}

#[test]
fn test_graphviz_export() {
    let log = new_log();
    let mut fg = FrameGraph::new(recording_allocator(log.clone()));

    let mut out = None;
    fg.add_pass(
        "kept",
        |builder: &mut Builder, _: &mut ()| {
            let x = builder.create_texture("x", color_desc(64));
            out = Some(builder.write(x));
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
    );
    fg.add_pass(
        "dropped",
        |builder: &mut Builder, _: &mut ()| {
            let z = builder.create_texture("z", color_desc(64));
            builder.write(z);
        },
        move |_resources: &FrameGraphPassResources, _: &(), _driver: &mut dyn Driver| {},
    );
    fg.present(out.unwrap());
    fg.compile();

    let mut dot = Vec::new();
    fg.export_graphviz(&mut dot).unwrap();
    let dot = String::from_utf8(dot).unwrap();

    assert!(dot.starts_with("digraph framegraph {"));
    assert!(dot.contains("kept"));
    // the culled pass renders dashed
    assert!(dot.contains("dropped\\nrefs: 0\", shape=rectangle, style=dashed"));
    assert!(dot.ends_with("}\n"));
}
