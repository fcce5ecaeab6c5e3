//! Hot-reload watcher
//!
//! Watches the assets **directory** (not the file itself): editors often save by writing
//! a temp file and renaming it over the original, which a file watch would lose.
//!
//! The watcher only sends lightweight signals. Re-reading `render.json` and installing
//! the new strategy happens on the render thread; program rebuilds happen at the next
//! draw.

use crossbeam_channel::{unbounded, Receiver};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotEvent {
    /// `render.json` (or its platform variant) changed.
    RenderConfigChanged(PathBuf),
    /// Anything else under the assets directory.
    Other,
}

pub struct HotReload {
    _watcher: RecommendedWatcher,
    rx: Receiver<HotEvent>,
}

impl HotReload {
    pub fn new(assets_dir: &Path) -> anyhow::Result<Self> {
        let (tx, rx) = unbounded::<HotEvent>();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                let Ok(ev) = res else { return };
                if matches!(ev.kind, EventKind::Access(_)) {
                    return;
                }
                for p in ev.paths {
                    let _ = tx.send(classify(p));
                }
            },
            // notify 6 has no debounce; a slower poll keeps the poll backend quiet.
            Config::default().with_poll_interval(Duration::from_millis(250)),
        )?;

        watcher.watch(assets_dir, RecursiveMode::NonRecursive)?;
        Ok(Self { _watcher: watcher, rx })
    }

    /// Drain pending events, collapsing bursts from one save into at most one reload.
    pub fn take_render_change(&self) -> Option<PathBuf> {
        self.rx
            .try_iter()
            .filter_map(|ev| match ev {
                HotEvent::RenderConfigChanged(p) => Some(p),
                HotEvent::Other => None,
            })
            .last()
    }
}

fn classify(p: PathBuf) -> HotEvent {
    let is_render_json = p.extension().and_then(|s| s.to_str()) == Some("json")
        && p
            .file_name()
            .and_then(|s| s.to_str())
            .map(|n| n.starts_with("render."))
            .unwrap_or(false);
    if is_render_json {
        HotEvent::RenderConfigChanged(p)
    } else {
        HotEvent::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_render_json_triggers_a_reload() {
        assert_eq!(
            classify(PathBuf::from("/a/assets/render.json")),
            HotEvent::RenderConfigChanged(PathBuf::from("/a/assets/render.json"))
        );
        assert!(matches!(
            classify(PathBuf::from("/a/assets/render.linux.json")),
            HotEvent::RenderConfigChanged(_)
        ));
        assert_eq!(classify(PathBuf::from("/a/assets/render.json~")), HotEvent::Other);
        assert_eq!(classify(PathBuf::from("/a/assets/params.json")), HotEvent::Other);
    }
}
