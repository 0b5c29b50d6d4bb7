mod app;
mod config;

use crate::app::App;
use plinth_runtime::Graphics;
use winit::event_loop::EventLoop;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = config::load_or_default("plinth.toml");

    let event_loop = EventLoop::<Graphics>::with_user_event().build().unwrap();

    let mut app = App::new(&event_loop, config);
    let _ = event_loop.run_app(&mut app);
}
