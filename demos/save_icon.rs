use std::sync::Arc;

use shortcut_icons::{IconCache, IconResourceService};

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let source = args
        .next()
        .unwrap_or_else(|| "C:\\Windows\\System32\\notepad.exe".to_owned());
    let output = args.next().unwrap_or_else(|| "output/icon.png".to_owned());

    let cache = Arc::new(IconCache::new());
    let service = IconResourceService::shell(Arc::clone(&cache));

    let icon = service.get_display_icon(&source);
    // Served from the cache this time.
    let again = service.get_display_icon(&source);
    assert_eq!(icon, again);

    if let Some(parent) = std::path::Path::new(&output).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    std::fs::write(&output, icon.bytes()).unwrap();
    println!(
        "{source}: {} ({} bytes, {} cached) -> {output}",
        icon.name(),
        icon.len(),
        cache.len()
    );
}
