use crate::browser;
use anyhow::{anyhow, Error, Result};
use async_trait::async_trait;
use futures::channel::oneshot::channel;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use wasm_bindgen::{
    // unchecked_ref: unchecked cast from a Javascript type to a Rust type
    JsCast,
    JsValue,
};
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

/// ┌─────────────── Frame Flow ───────────────┐
/// │ requestAnimationFrame                    │
/// │   └─► GameLoop accumulates elapsed time  │
/// │         ├─► Game::update() per 1/60 s    │
/// │         │     (input, walking, events)   │
/// │         └─► Game::draw() once per frame  │
/// └──────────────────────────────────────────┘
#[async_trait(?Send)]
pub trait Game {
    async fn initialize(&self) -> Result<Box<dyn Game>>;
    fn update(&mut self, pointer: &input::PointerState);
    fn draw(&mut self, renderer: &Renderer);
}

// length of a frame in milliseconds
const FRAME_SIZE: f32 = 1.0 / 60.0 * 1000.0;

pub struct GameLoop {
    last_frame: f64,
    accumulated_delta: f32,
}

type SharedLoopClosure = Rc<RefCell<Option<browser::LoopClosure>>>;

impl GameLoop {
    pub async fn start(game: impl Game + 'static) -> Result<()> {
        let mut pointer_receiver = input::prepare_input()?;
        let mut game = game.initialize().await?;
        let mut game_loop = GameLoop {
            last_frame: browser::now()?,
            accumulated_delta: 0.0,
        };
        let renderer = Renderer {
            context: browser::context()?,
        };
        let mut pointer_state = input::PointerState::new();
        let f: SharedLoopClosure = Rc::new(RefCell::new(None));
        let g = f.clone();
        *g.borrow_mut() = Some(browser::create_raf_closure(move |perf: f64| {
            input::process_input(&mut pointer_state, &mut pointer_receiver);
            game_loop.accumulated_delta += (perf - game_loop.last_frame) as f32;
            while game_loop.accumulated_delta > FRAME_SIZE {
                game.update(&pointer_state);
                // clicks are handled by the first update of the frame only
                pointer_state.clear();
                game_loop.accumulated_delta -= FRAME_SIZE;
            }
            game_loop.last_frame = perf;
            game.draw(&renderer);
            if let Some(closure) = f.borrow().as_ref() {
                let _ = browser::request_animation_frame(closure);
            }
        }));

        browser::request_animation_frame(
            g.borrow()
                .as_ref()
                .ok_or_else(|| anyhow!("GameLoop: Loop is None"))?,
        )?;

        Ok(())
    }
}

// ==================== Geometry ====================
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Rect {
    pub position: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(position: Point, size: Size) -> Self {
        Rect { position, size }
    }

    /// Half-open on the far edges so neighbouring rects never both claim a
    /// shared border.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.position.x
            && point.x < self.position.x + self.size.width
            && point.y >= self.position.y
            && point.y < self.position.y + self.size.height
    }
}

// ==================== Rendering ====================
pub struct Renderer {
    context: CanvasRenderingContext2d,
}

impl Renderer {
    pub fn clear(&self, rect: &Rect) {
        self.context.clear_rect(
            rect.position.x,
            rect.position.y,
            rect.size.width,
            rect.size.height,
        );
    }

    pub fn draw_image(&self, image: &HtmlImageElement, frame: &Rect, destination: &Rect) {
        if let Err(err) = self
            .context
            .draw_image_with_html_image_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                image,
                frame.position.x,
                frame.position.y,
                frame.size.width,
                frame.size.height,
                destination.position.x,
                destination.position.y,
                destination.size.width,
                destination.size.height,
            )
        {
            log::error!("Drawing image failed : {:#?}", err);
        }
    }

    /// Draw mirrored around the vertical axis. `destination.position` is the
    /// on-screen top-left corner, as for `draw_image`.
    pub fn draw_image_flipped(&self, image: &HtmlImageElement, frame: &Rect, destination: &Rect) {
        self.context.save();
        let _ = self
            .context
            .translate(destination.position.x + destination.size.width, destination.position.y);
        let _ = self.context.scale(-1.0, 1.0);
        self.draw_image(
            image,
            frame,
            &Rect::new(Point::new(0.0, 0.0), destination.size),
        );
        self.context.restore();
    }

    #[allow(deprecated)]
    pub fn fill_polygon(&self, points: &[Point], color: &str) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        self.context.begin_path();
        self.context.move_to(first.x, first.y);
        for point in rest {
            self.context.line_to(point.x, point.y);
        }
        self.context.close_path();
        self.context.set_fill_style(&JsValue::from_str(color));
        self.context.fill();
    }
}

// ==================== Assets ====================
/// Asynchronously load an image from a given source path
/// # Arguments
/// * `source` - string slice to path/url
/// # Returns
/// * `Ok(HtmlImageElement)` - on load success
/// * `Err` - on load fail
pub async fn load_image(source: &str) -> Result<HtmlImageElement> {
    let image = browser::new_image()?;
    let (tx, rx) = channel::<Result<(), Error>>();
    let success_tx = Rc::new(RefCell::new(Some(tx)));
    let error_tx = success_tx.clone();

    let success_callback = browser::closure_once(move || {
        if let Some(tx) = success_tx.borrow_mut().take() {
            let _ = tx.send(Ok(()));
        }
    });

    let owned_source = source.to_string();
    let error_callback = browser::closure_once(move |err: JsValue| {
        if let Some(tx) = error_tx.borrow_mut().take() {
            let _ = tx.send(Err(anyhow!(
                "[engine.rs::load_image] Error loading image {}: {:#?}",
                owned_source,
                err
            )));
        }
    });

    image.set_onload(Some(success_callback.as_ref().unchecked_ref()));
    image.set_onerror(Some(error_callback.as_ref().unchecked_ref()));
    image.set_src(source);

    // keep callback alive until image is loaded or errors
    success_callback.forget();
    error_callback.forget();

    // ?? - double unwrap because Result<Result<(), Error>, oneshot::Canceled>
    rx.await??;

    Ok(image)
}

pub const DEFAULT_POLL_INTERVAL_MS: u32 = 200;
pub const DEFAULT_LOAD_TIMEOUT_MS: u32 = 500;

/// Cooperative poll: check `is_ready`, otherwise sleep for at most
/// `DEFAULT_POLL_INTERVAL_MS` and try again until `timeout_ms` is used up.
///
/// ```text
/// remaining: 500 ─► 300 ─► 100 ─► 0 ─► Err
///             poll   poll   poll   poll
/// ```
pub async fn wait_until<R, S, F>(mut is_ready: R, mut sleep: S, timeout_ms: u32) -> Result<()>
where
    R: FnMut() -> bool,
    S: FnMut(u32) -> F,
    F: Future<Output = ()>,
{
    let mut remaining = timeout_ms;
    loop {
        if is_ready() {
            return Ok(());
        }
        if remaining == 0 {
            return Err(anyhow!("not ready after waiting {} ms", timeout_ms));
        }
        let sleep_time = remaining.min(DEFAULT_POLL_INTERVAL_MS);
        sleep(sleep_time).await;
        remaining -= sleep_time;
        log::debug!("waiting {} more ms", remaining);
    }
}

/// Some browsers report an image as loaded before its dimensions are
/// available. Wait for a non-zero width and height.
pub async fn wait_until_loaded(image: &HtmlImageElement, timeout_ms: u32) -> Result<()> {
    log::debug!("Loading image {}", image.src());
    wait_until(
        || image.natural_width() > 0 && image.natural_height() > 0,
        browser::sleep,
        timeout_ms,
    )
    .await
    .map_err(|err| anyhow!("Image {} failed to load in given time : {}", image.src(), err))
}

pub fn image_size(image: &HtmlImageElement) -> Size {
    Size::new(image.natural_width().into(), image.natural_height().into())
}

// ==================== Input ====================
pub mod input {
    use crate::browser;
    use crate::engine::Point;
    use anyhow::Result;
    use futures::channel::mpsc::{unbounded, UnboundedReceiver};
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::JsCast;

    pub enum PointerPress {
        Click(Point),
    }

    /// Clicks collected since the last update, in canvas pixels
    #[derive(Debug, Default)]
    pub struct PointerState {
        clicks: Vec<Point>,
    }

    impl PointerState {
        pub fn new() -> Self {
            PointerState { clicks: Vec::new() }
        }

        pub fn push(&mut self, point: Point) {
            self.clicks.push(point);
        }

        pub fn clicks(&self) -> &[Point] {
            &self.clicks
        }

        pub fn clear(&mut self) {
            self.clicks.clear();
        }
    }

    pub fn prepare_input() -> Result<UnboundedReceiver<PointerPress>> {
        let (click_sender, click_receiver) = unbounded();
        let click_sender = Rc::new(RefCell::new(click_sender));
        let onclick = browser::closure_wrap(Box::new(move |event: web_sys::MouseEvent| {
            let point = Point::new(event.offset_x().into(), event.offset_y().into());
            let _ = click_sender
                .borrow_mut()
                .start_send(PointerPress::Click(point));
        }) as Box<dyn FnMut(web_sys::MouseEvent)>);

        browser::canvas()?
            .add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())
            .map_err(|err| anyhow::anyhow!("Could not listen for clicks : {:#?}", err))?;
        onclick.forget();

        Ok(click_receiver)
    }

    pub fn process_input(state: &mut PointerState, receiver: &mut UnboundedReceiver<PointerPress>) {
        loop {
            match receiver.try_next() {
                Ok(None) => break,
                Err(_err) => break,
                Ok(Some(PointerPress::Click(point))) => state.push(point),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::Cell;

    #[test]
    fn rect_contains_is_half_open() {
        let rect = Rect::new(Point::new(10.0, 10.0), Size::new(20.0, 5.0));
        assert!(rect.contains(Point::new(10.0, 10.0)));
        assert!(rect.contains(Point::new(29.9, 14.9)));
        assert!(!rect.contains(Point::new(30.0, 12.0)));
        assert!(!rect.contains(Point::new(15.0, 15.0)));
    }

    #[test]
    fn wait_until_resolves_once_ready() {
        let polls = Cell::new(0);
        let slept = Cell::new(0);
        let result = block_on(wait_until(
            || {
                polls.set(polls.get() + 1);
                polls.get() >= 3
            },
            |ms| {
                slept.set(slept.get() + ms);
                futures::future::ready(())
            },
            2000,
        ));
        assert!(result.is_ok());
        assert_eq!(polls.get(), 3);
        assert_eq!(slept.get(), 400);
    }

    #[test]
    fn wait_until_times_out_after_the_budget() {
        let sleeps = RefCell::new(Vec::new());
        let result = block_on(wait_until(
            || false,
            |ms| {
                sleeps.borrow_mut().push(ms);
                futures::future::ready(())
            },
            500,
        ));
        assert!(result.is_err());
        assert_eq!(*sleeps.borrow(), vec![200, 200, 100]);
    }

    #[test]
    fn wait_until_does_not_sleep_when_already_ready() {
        let result = block_on(wait_until(
            || true,
            |_| -> futures::future::Ready<()> { panic!("should not sleep") },
            0,
        ));
        assert!(result.is_ok());
    }

    #[test]
    fn pointer_state_collects_and_clears() {
        let mut state = input::PointerState::new();
        state.push(Point::new(1.0, 2.0));
        state.push(Point::new(3.0, 4.0));
        assert_eq!(state.clicks().len(), 2);
        state.clear();
        assert!(state.clicks().is_empty());
    }
}
