#![cfg(target_arch = "wasm32")]
mod graph;

pub use graph::{WebAudioGraph, WebNode};

use sfx_core::{Effect, EngineConfig, SoundEngine};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys as web;

type Engine = SoundEngine<WebAudioGraph>;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("sfx-web loaded");
    Ok(())
}

/// Browser-facing handle to the sound engine.
///
/// Every method is safe to call at any time, including before `init()` or
/// when the page has no audio output; such calls do nothing.
#[wasm_bindgen]
pub struct SoundFx {
    engine: Rc<RefCell<Engine>>,
}

impl Default for SoundFx {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl SoundFx {
    #[wasm_bindgen(constructor)]
    pub fn new() -> SoundFx {
        SoundFx {
            engine: Rc::new(RefCell::new(SoundEngine::new(EngineConfig::default()))),
        }
    }

    pub fn init(&self) {
        self.engine.borrow_mut().init();
    }

    /// Resolves once the audio context is running (or immediately when
    /// there is nothing to resume).
    pub fn resume(&self) -> js_sys::Promise {
        let pending = self.engine.borrow_mut().resume();
        future_to_promise(async move {
            pending.await;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Initialise and resume on the first pointer or key press anywhere on
    /// the page, satisfying browser autoplay rules.
    #[wasm_bindgen(js_name = installGestureResume)]
    pub fn install_gesture_resume(&self) -> Result<(), JsValue> {
        attach_gesture_listeners(self.engine.clone()).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = setEnabled)]
    pub fn set_enabled(&self, enabled: bool) {
        self.engine.borrow_mut().set_enabled(enabled);
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&self, volume: f32) {
        self.engine.borrow_mut().set_volume(volume);
    }

    #[wasm_bindgen(js_name = setMusicVolume)]
    pub fn set_music_volume(&self, volume: f32) {
        self.engine.borrow_mut().set_music_volume(volume);
    }

    #[wasm_bindgen(js_name = setMusicEnabled)]
    pub fn set_music_enabled(&self, enabled: bool) {
        self.engine.borrow_mut().set_music_enabled(enabled);
    }

    #[wasm_bindgen(getter, js_name = contextPresent)]
    pub fn context_present(&self) -> bool {
        self.engine.borrow().context_present()
    }

    #[wasm_bindgen(getter)]
    pub fn enabled(&self) -> bool {
        self.engine.borrow().is_enabled()
    }

    #[wasm_bindgen(getter, js_name = musicEnabled)]
    pub fn music_enabled(&self) -> bool {
        self.engine.borrow().is_music_enabled()
    }

    #[wasm_bindgen(getter)]
    pub fn volume(&self) -> f32 {
        self.engine.borrow().volume()
    }

    #[wasm_bindgen(getter, js_name = musicVolume)]
    pub fn music_volume(&self) -> f32 {
        self.engine.borrow().music_volume()
    }

    #[wasm_bindgen(getter, js_name = ambientPlaying)]
    pub fn ambient_playing(&self) -> bool {
        self.engine.borrow().is_ambient_playing()
    }

    /// Play a catalog effect by name (`"click"`, `"add-to-cart"`,
    /// `"typewriter:12"`...). Unknown names are logged and ignored.
    pub fn play(&self, name: &str) {
        match name.parse::<Effect>() {
            Ok(effect) => self.engine.borrow_mut().play(effect),
            Err(e) => log::warn!("[sfx] {}", e),
        }
    }

    pub fn hover(&self) {
        self.engine.borrow_mut().hover();
    }

    pub fn click(&self) {
        self.engine.borrow_mut().click();
    }

    pub fn success(&self) {
        self.engine.borrow_mut().success();
    }

    pub fn error(&self) {
        self.engine.borrow_mut().error();
    }

    pub fn warning(&self) {
        self.engine.borrow_mut().warning();
    }

    pub fn open(&self) {
        self.engine.borrow_mut().open();
    }

    pub fn close(&self) {
        self.engine.borrow_mut().close();
    }

    pub fn boot(&self) {
        self.engine.borrow_mut().boot();
    }

    pub fn notification(&self) {
        self.engine.borrow_mut().notification();
    }

    pub fn scan(&self) {
        self.engine.borrow_mut().scan();
    }

    #[wasm_bindgen(js_name = addToCart)]
    pub fn add_to_cart(&self) {
        self.engine.borrow_mut().add_to_cart();
    }

    pub fn transaction(&self) {
        self.engine.borrow_mut().transaction();
    }

    pub fn connect(&self) {
        self.engine.borrow_mut().connect();
    }

    pub fn disconnect(&self) {
        self.engine.borrow_mut().disconnect();
    }

    pub fn glitch(&self) {
        self.engine.borrow_mut().glitch();
    }

    pub fn decrypt(&self) {
        self.engine.borrow_mut().decrypt();
    }

    #[wasm_bindgen(js_name = panelOpen)]
    pub fn panel_open(&self) {
        self.engine.borrow_mut().panel_open();
    }

    #[wasm_bindgen(js_name = panelClose)]
    pub fn panel_close(&self) {
        self.engine.borrow_mut().panel_close();
    }

    /// `charCount` defaults to 5 when omitted.
    pub fn typewriter(&self, char_count: Option<u32>) {
        let mut engine = self.engine.borrow_mut();
        match char_count {
            Some(n) => engine.typewriter(n),
            None => engine.typewriter_default(),
        }
    }

    #[wasm_bindgen(js_name = startAmbientMusicFromAnalysis)]
    pub fn start_ambient_music_from_analysis(&self) {
        self.engine.borrow_mut().start_ambient_music_from_analysis();
    }

    #[wasm_bindgen(js_name = stopAmbientMusic)]
    pub fn stop_ambient_music(&self) {
        self.engine.borrow_mut().stop_ambient_music();
    }
}

fn attach_gesture_listeners(engine: Rc<RefCell<Engine>>) -> anyhow::Result<()> {
    let window = web::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    for event in ["pointerdown", "keydown"] {
        let engine = engine.clone();
        let closure = Closure::wrap(Box::new(move || {
            let pending = {
                let mut e = engine.borrow_mut();
                e.init();
                e.resume()
            };
            spawn_local(pending);
        }) as Box<dyn FnMut()>);
        window
            .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            .map_err(|e| anyhow::anyhow!(format!("{:?}", e)))?;
        closure.forget();
    }
    log::info!("[gesture] audio resume armed");
    Ok(())
}
