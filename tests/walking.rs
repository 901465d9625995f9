use adventure_wasm::context::GameContext;
use adventure_wasm::engine::{Point, Rect, Size};
use adventure_wasm::error::AdventureError;
use adventure_wasm::item::ItemCatalogue;
use adventure_wasm::room::{Room, RoomConfig};
use adventure_wasm::sprite::character::{ArrivalCallback, Character, CharacterConfig};
use adventure_wasm::sprite::Direction;
use adventure_wasm::stage::{RenderSurface, Stage};
use adventure_wasm::units::{self, Axis, CanvasSize};
use std::cell::Cell;
use std::rc::Rc;

fn context() -> GameContext {
    let mut ctx = GameContext::new(Some(CanvasSize::new(800.0, 600.0)));
    ctx.register_image("cellar.png", Size::new(800.0, 600.0));
    ctx.register_image("barrel.png", Size::new(200.0, 400.0));
    ctx
}

fn hero(ctx: &mut GameContext) -> Character {
    let config: CharacterConfig = serde_json::from_str(
        r#"{
            "id": "player", "name": "Hero", "src": "hero.png",
            "spritesheet": {
                "frames": {"width": 40, "height": 100, "count": 9, "columns": 3},
                "animations": {"idle": [0], "up": [1], "down": [2], "right": [3, 5],
                               "upright": [6], "downright": [7], "downleft": [8]}
            },
            "flipped_animations": {"left": "right", "upleft": "upright"}
        }"#,
    )
    .unwrap();
    Character::new(&config, ctx).unwrap()
}

fn counter() -> (Rc<Cell<u32>>, ArrivalCallback) {
    let count = Rc::new(Cell::new(0));
    let inner = count.clone();
    (count, Box::new(move || inner.set(inner.get() + 1)))
}

#[test]
fn walking_north_arrives_after_four_ticks() {
    let mut ctx = context();
    let mut hero = hero(&mut ctx);
    hero.set_character_position(Point::new(100.0, 100.0));
    let (count, callback) = counter();
    hero.walk_to_position(Point::new(100.0, 80.0), Some(callback));

    for expected in [95.0, 90.0, 85.0] {
        assert!(!hero.step().unwrap());
        assert_eq!(hero.location(), Point::new(100.0, expected));
        assert_eq!(hero.facing(), Direction::Up);
    }
    assert!(hero.step().unwrap());
    assert_eq!(hero.location(), Point::new(100.0, 80.0));
    assert_eq!(hero.facing(), Direction::Idle);
    assert_eq!(count.get(), 1);

    let node = hero.node().clone();
    assert!(!hero.step().unwrap());
    assert_eq!(hero.node(), &node);
    assert_eq!(count.get(), 1);
}

#[test]
fn diagonal_steps_move_each_axis_by_the_full_distance() {
    let mut ctx = context();
    let mut hero = hero(&mut ctx);
    hero.set_character_position(Point::new(100.0, 100.0));
    hero.walk_to_position(Point::new(200.0, 200.0), None);
    hero.step().unwrap();
    assert_eq!(hero.location(), Point::new(105.0, 105.0));
    assert_eq!(hero.facing(), Direction::DownRight);
}

#[test]
fn mirrored_walk_keeps_the_anchor_in_place() {
    let mut ctx = context();
    let mut hero = hero(&mut ctx);
    hero.set_character_position(Point::new(300.0, 300.0));
    assert_eq!(
        hero.node().bounds(),
        Rect::new(Point::new(280.0, 200.0), Size::new(40.0, 100.0))
    );

    hero.walk_to_position(Point::new(100.0, 300.0), None);
    hero.step().unwrap();
    assert_eq!(hero.facing(), Direction::Left);
    assert!(hero.node().scale_x < 0.0);
    // origin moved by one body width, the drawn image only by the step
    assert_eq!(hero.node().position.x, 315.0);
    assert_eq!(
        hero.node().bounds(),
        Rect::new(Point::new(275.0, 200.0), Size::new(40.0, 100.0))
    );
}

#[test]
fn percent_boxes_fit_against_the_opposite_canvas_side() {
    let canvas = Some(CanvasSize::new(800.0, 600.0));
    let scale = units::resolve_scale_to_fit("50%", Size::new(100.0, 100.0), canvas).unwrap();
    assert_eq!(scale, 3.0);
    assert_eq!(units::resolve_length("25%", Axis::X, canvas), Ok(200.0));
    assert_eq!(units::resolve_length("25%", Axis::Y, canvas), Ok(150.0));
    assert_eq!(
        units::resolve_length("25%", Axis::Y, None),
        Err(AdventureError::StageUnavailable("25%".into()))
    );
}

fn cellar() -> RoomConfig {
    serde_json::from_str(
        r#"{
            "id": "cellar",
            "background": "cellar.png",
            "floor": [{"x": 0, "y": 0}, {"x": 800, "y": 0},
                      {"x": 800, "y": 600}, {"x": 0, "y": 600}],
            "items": [{"id": "barrel", "name": "Barrel", "src": "barrel.png",
                       "x": "300px", "y": "0px"}],
            "entrance": {"x": "10%", "y": "50%", "location": "S"},
            "pathfinding": true
        }"#,
    )
    .unwrap()
}

#[test]
fn entering_from_the_south_walks_up_into_the_room() {
    let mut ctx = context();
    let mut stage = Stage::new();
    let mut hero = hero(&mut ctx);
    let mut room = Room::new(&cellar(), &ItemCatalogue::new(), &mut ctx).unwrap();
    let door = room.entrance().cloned();

    room.load(&mut hero, door.as_ref(), &ctx, &mut stage).unwrap();
    assert_eq!(hero.location(), Point::new(80.0, 405.0));
    assert_eq!(hero.target(), Some(Point::new(80.0, 295.0)));
    assert!(stage.has_node(hero.node().id));
}

#[test]
fn pathfinding_walks_around_items() {
    let mut ctx = context();
    let mut stage = Stage::new();
    let mut hero = hero(&mut ctx);
    let mut room = Room::new(&cellar(), &ItemCatalogue::new(), &mut ctx).unwrap();
    room.load(&mut hero, None, &ctx, &mut stage).unwrap();
    hero.set_character_position(Point::new(150.0, 150.0));
    hero.sync(&mut stage);

    let (count, callback) = counter();
    room.walk_player_to(&mut hero, &stage, Point::new(650.0, 150.0), &[], Some(callback))
        .unwrap();
    assert!(hero.pending_waypoints() > 0);

    // the barrel reaches down to y = 400, the only way past is below it
    let mut lowest = hero.location().y;
    for _ in 0..1000 {
        if hero.step().unwrap() {
            break;
        }
        lowest = lowest.max(hero.location().y);
    }
    assert!(lowest >= 400.0, "cut through the barrel, lowest point {lowest}");
    assert_eq!(hero.location(), Point::new(650.0, 150.0));
    assert_eq!(count.get(), 1);
}
