//! Integration tests for the scene store driven by the layer stack
//!
//! A layer owns the scene, animates it in `on_update` and gathers the
//! per-frame arrays in `on_render`, as an application would before copying
//! them into GPU buffers. No GPU required.
//!
//! Run with: cargo test -p lumen_engine --test scene_integration_tests

use lumen_engine::glam::{Vec2, Vec3, Vec4};
use lumen_engine::lumen::layer::{Layer, LayerStack};
use lumen_engine::lumen::resource::{Material, Vertex};
use lumen_engine::lumen::scene::{DirectionLight, EntityKey, FrameData, Mesh, Scene, Transform};
use lumen_engine::lumen::Result;
use std::cell::RefCell;
use std::rc::Rc;

fn triangle() -> Mesh {
    Mesh::new(
        vec![
            Vertex::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::Z, Vec2::ZERO),
            Vertex::new(Vec3::new(1.0, 0.0, 0.0), Vec3::Z, Vec2::X),
            Vertex::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Z, Vec2::Y),
        ],
        vec![0, 1, 2],
    )
}

struct SceneLayer {
    scene: Scene,
    moving: EntityKey,
    speed: f32,
    gathered: Rc<RefCell<Vec<FrameData>>>,
}

impl Layer for SceneLayer {
    fn name(&self) -> &str {
        "scene"
    }

    fn on_update(&mut self, dt: f32) -> Result<()> {
        if let Some(transform) = self.scene.component_mut::<Transform>(self.moving) {
            transform.position.x += self.speed * dt;
        }
        Ok(())
    }

    fn on_render(&mut self) -> Result<()> {
        self.gathered.borrow_mut().push(self.scene.gather_frame_data());
        Ok(())
    }
}

fn build_scene() -> (Scene, EntityKey) {
    let mut scene = Scene::new();

    let red = scene.create_entity();
    scene.add_component(red, triangle());
    scene.add_component(red, Material::new(0.5, 0.0, Vec3::X, Vec3::ZERO));

    let green = scene.create_entity();
    scene.add_component(green, triangle());
    scene.add_component(green, Material::new(0.2, 1.0, Vec3::Y, Vec3::ZERO));
    scene.add_component(green, Transform::from_position(Vec3::new(0.0, 0.0, -5.0)));

    // Material but no mesh: not drawable
    let ghost = scene.create_entity();
    scene.add_component(ghost, Material::default());

    let sun = scene.create_entity();
    scene.add_component(sun, DirectionLight { color: Vec3::new(1.0, 0.5, 0.25), intensity: 2.0 });

    (scene, green)
}

#[test]
fn test_integration_layer_gathers_scene_each_frame() {
    let (scene, moving) = build_scene();
    let gathered = Rc::new(RefCell::new(Vec::new()));

    let mut stack = LayerStack::new();
    stack.push(SceneLayer { scene, moving, speed: 2.0, gathered: gathered.clone() });

    for _ in 0..3 {
        stack.run_frame(0.5).unwrap();
    }

    let frames = gathered.borrow();
    assert_eq!(frames.len(), 3);

    for frame in frames.iter() {
        assert_eq!(frame.render_objects.len(), 2);
        assert_eq!(frame.materials.len(), 2);
        assert_eq!(frame.mesh_objects.len(), 2);
        assert_eq!(frame.lights.len(), 1);
    }

    // The moving entity advances 1 unit per frame before being gathered
    let moving_x: Vec<f32> = frames
        .iter()
        .map(|frame| {
            let object = frame.mesh_objects.iter().find(|o| o.entity == moving).unwrap();
            frame.render_objects[object.render_object_index].transform.w_axis.x
        })
        .collect();
    assert_eq!(moving_x, vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_integration_render_objects_index_their_materials() {
    let (scene, moving) = build_scene();
    let data = scene.gather_frame_data();

    for object in &data.mesh_objects {
        let render_object = &data.render_objects[object.render_object_index];
        let material = &data.materials[render_object.material_index as usize];
        assert_eq!(Some(material), scene.component::<Material>(object.entity));
    }

    let green = data.mesh_objects.iter().find(|o| o.entity == moving).unwrap();
    let green_material = data.materials[data.render_objects[green.render_object_index].material_index as usize];
    assert_eq!(green_material.base_color, Vec4::new(0.0, 1.0, 0.0, 0.0));
}

#[test]
fn test_integration_light_color_is_premultiplied() {
    let (scene, _) = build_scene();
    let data = scene.gather_frame_data();

    assert_eq!(data.lights[0].color.truncate(), Vec3::new(2.0, 1.0, 0.5));
}

#[test]
fn test_integration_destroyed_entity_leaves_frame_data() {
    let (mut scene, moving) = build_scene();
    assert!(scene.destroy_entity(moving));

    let data = scene.gather_frame_data();
    assert_eq!(data.render_objects.len(), 1);
    assert!(data.mesh_objects.iter().all(|o| o.entity != moving));
}
