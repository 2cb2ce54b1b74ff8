use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::classify_types::Category;
use crate::models::fs_types::{CategoryStats, ClearReport, StoredImage};
use crate::services::storage::CategoryStore;
use crate::services::watcher::StatsWatcher;
use tracing::info;

fn print_stats(stats: &CategoryStats) {
    for (category, count) in &stats.counts {
        println!("{:<12} {:>6}", category.name(), count);
    }
    println!("{:<12} {:>6}", "total", stats.total());
}

pub fn get_category_stats(config: &AppConfig, json: bool) -> Result<CategoryStats, AppError> {
    let stats = CategoryStore::new(&config.base_dir).stats()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Images in {}", config.base_dir.display());
        print_stats(&stats);
    }
    Ok(stats)
}

pub fn list_category(config: &AppConfig, category: Category) -> Result<Vec<StoredImage>, AppError> {
    let store = CategoryStore::new(&config.base_dir);
    let images = store.list_images(category)?;
    if images.is_empty() {
        println!("No images in {}", category);
    } else {
        println!("{} ({} images)", category, images.len());
        for image in &images {
            println!("  {:<40} {:>10} bytes", image.name, image.size);
        }
    }
    Ok(images)
}

pub fn delete_image(config: &AppConfig, category: Category, name: &str) -> Result<(), AppError> {
    let removed = CategoryStore::new(&config.base_dir).remove_image(category, name)?;
    println!("Removed {}", removed.display());
    Ok(())
}

pub fn clear_categories(config: &AppConfig) -> ClearReport {
    let report = CategoryStore::new(&config.base_dir).clear_all();
    println!("Removed {} images", report.removed);
    for failure in &report.failures {
        println!("!! {}: {}", failure.path.display(), failure.reason);
    }
    report
}

/// Prints counts on start and after each storage change until Ctrl-C.
pub async fn watch_stats(config: &AppConfig) -> Result<(), AppError> {
    let store = CategoryStore::new(&config.base_dir);
    store.ensure_layout()?;
    print_stats(&store.stats()?);

    let _watcher = StatsWatcher::watch(store, |stats| {
        println!();
        print_stats(&stats);
    })?;
    info!("Watching {} (Ctrl-C to stop)", config.base_dir.display());

    tokio::signal::ctrl_c().await?;
    Ok(())
}
