// ==================== Imports ====================
use engine::GameLoop;
use game::AdventureGame;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsValue;

pub mod browser;
pub mod container;
pub mod context;
pub mod engine;
pub mod error;
pub mod game;
pub mod item;
pub mod pathfinding;
pub mod room;
pub mod sprite;
pub mod stage;
pub mod units;

// ==================== Main Functions ====================
/// Main entry for Webassembly module
/// - installs the console logger
/// - loads `game.json` and every image it names
/// - starts the game loop in the start room
#[wasm_bindgen]
pub fn main_js() -> Result<(), JsValue> {
    // setup better panic messages for debugging
    console_error_panic_hook::set_once();

    if let Err(err) = browser::init_logger(log::LevelFilter::Info) {
        web_sys::console::warn_1(&JsValue::from_str(&err.to_string()));
    }

    // spawns a new asynchronous task in local thread, for web assembly
    // environment, using wasm_bindgen_futures
    browser::spawn_local(async move {
        if let Err(err) = GameLoop::start(AdventureGame::new()).await {
            log::error!("Could not start game : {:#?}", err);
        }
    });

    Ok(())
}
