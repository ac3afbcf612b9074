use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tenure_core::*;
use tenure_lifecycle::*;
use tenure_navigation::{EntryScope, NavBackStack, NavDisplay, Navigator, renderer};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum Screen {
    Inbox,
    Message(u32),
}

fn screen(entry: &EntryScope<Screen>, unread: u32) -> View {
    match entry.key() {
        Screen::Inbox => View::new("inbox")
            .on_appear(|| log::info!("inbox: appear"))
            .on_disappear(|| log::info!("inbox: disappear"))
            .on_load(|| log::info!("inbox: load"))
            .on_change_of(unread, ChangeTrigger::WithLoad, |old, new| {
                log::info!("inbox: unread {old} -> {new}")
            })
            .load_task(TaskPriority::Low, || async {
                for page in 1..=3 {
                    log::info!("inbox: synced page {page}");
                    yield_now().await;
                }
            })
            .on_destroy(|| log::info!("inbox: destroy")),
        Screen::Message(id) => {
            let id = *id;
            View::new("message")
                .on_load(move || log::info!("message {id}: load"))
                .on_destroy(move || log::info!("message {id}: destroy"))
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let rt = Runtime::new(RuntimeConfig::default());
    let _entered = rt.enter()?;

    let unread = Rc::new(Cell::new(3));
    let stack = Rc::new(NavBackStack::new(Screen::Inbox));
    let nav = Navigator::new((*stack).clone());
    let render = renderer({
        let unread = unread.clone();
        move |entry: &EntryScope<Screen>| screen(entry, unread.get())
    });

    let mut scheduler = Scheduler::new();
    let mut frame = |step: &str| -> anyhow::Result<()> {
        log::info!("-- {step}");
        let (stack, render) = (stack.clone(), render.clone());
        scheduler.compose(move |_| NavDisplay(stack.clone(), render.clone()));
        rt.run_until_idle()?;
        Ok(())
    };

    frame("start")?;

    unread.set(2);
    frame("one message read")?;

    nav.push(Screen::Message(7));
    frame("open message 7")?;

    nav.pop();
    frame("back to inbox")?;

    nav.push(Screen::Message(8));
    frame("open message 8")?;
    nav.replace(Screen::Message(9));
    frame("replace with message 9")?;

    nav.clear_and_push(Screen::Inbox);
    frame("reset to a fresh inbox")?;

    log::info!("saved stack: {}", stack.to_json());
    rt.shutdown()?;
    Ok(())
}
