//! Benchmarks for the mark-visible and allocate passes.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::{Mat4, Vec3};
use penumbra_vsm::{
    DepthView, FrameInputs, PageRenderRequest, ShadowCaster, VirtualShadowMap, VsmConfig,
};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 180;

struct NullCaster;

impl ShadowCaster for NullCaster {
    fn render_page(&self, _request: &PageRenderRequest, _target: &mut [f32]) {}
}

fn inputs() -> FrameInputs {
    FrameInputs {
        camera_position: Vec3::new(0.0, 3.0, 6.0),
        light_direction: Vec3::new(1.0, 1.0, 1.0),
    }
}

/// Depth buffer of a camera looking at the ground plane y = 0.
fn ground_depth() -> (Vec<f32>, Mat4) {
    let eye = inputs().camera_position;
    let vp = Mat4::perspective_rh(1.0, WIDTH as f32 / HEIGHT as f32, 0.1, 200.0)
        * Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
    let inv = vp.inverse();
    let mut depth = vec![1.0; (WIDTH * HEIGHT) as usize];
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let ndc_x = (x as f32 + 0.5) / WIDTH as f32 * 2.0 - 1.0;
            let ndc_y = 1.0 - (y as f32 + 0.5) / HEIGHT as f32 * 2.0;
            let near = inv.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
            let far = inv.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
            let dir = far - near;
            if dir.y < -1e-6 {
                let hit = near + dir * (-near.y / dir.y);
                depth[(y * WIDTH + x) as usize] = vp.project_point3(hit).z;
            }
        }
    }
    (depth, inv)
}

fn bench_passes(c: &mut Criterion) {
    let (depth, inv) = ground_depth();
    let view = DepthView::new(WIDTH, HEIGHT, &depth, inv).expect("depth buffer size");
    let mut vsm = VirtualShadowMap::new(VsmConfig::default()).expect("default config");
    vsm.run_frame(inputs(), &view, &NullCaster).expect("warm-up frame");

    c.bench_function("mark_visible_pass", |b| {
        b.iter(|| {
            vsm.begin_frame(inputs()).expect("begin");
            vsm.reset_pass().expect("reset");
            vsm.mark_visible_pass(black_box(&view)).expect("mark");
            vsm.abandon_frame();
        });
    });

    c.bench_function("allocate_pass", |b| {
        b.iter(|| {
            vsm.begin_frame(inputs()).expect("begin");
            vsm.reset_pass().expect("reset");
            vsm.mark_visible_pass(&view).expect("mark");
            vsm.allocate_pass().expect("allocate");
            vsm.abandon_frame();
        });
    });

    c.bench_function("full_frame", |b| {
        b.iter(|| black_box(vsm.run_frame(inputs(), &view, &NullCaster).expect("frame")));
    });
}

criterion_group!(benches, bench_passes);
criterion_main!(benches);
