#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use boardcanon::model::{Listing, ScrapedBoard};

/// Canonical models the generator decorates, as `(brand, model)`.
pub const CATALOG: &[(&str, &str)] = &[
    ("Burton", "Custom"),
    ("Burton", "Process"),
    ("Burton", "Feelgood"),
    ("Lib Tech", "Orca"),
    ("Lib Tech", "Skunk Ape"),
    ("Lib Tech", "Golden Orca"),
    ("GNU", "Money"),
    ("GNU", "C Money"),
    ("GNU", "Head Space"),
    ("CAPiTA", "DOA"),
    ("CAPiTA", "Mercury"),
    ("Jones", "Mountain Twin"),
    ("Jones", "Flagship"),
    ("Ride", "Warpig"),
    ("Never Summer", "Proto Type Two"),
];

const RETAILERS: &[&str] = &["evo", "rei", "backcountry", "tactics", "blue-tomato"];

#[derive(Debug, Clone)]
pub struct NoisyTitle {
    pub brand: &'static str,
    pub model: &'static str,
    pub title: String,
}

/// Retailer-style titles wrapped around known models: brand prefix, category word,
/// season, length and retail tags in random combinations.
pub fn generate_titles(count: usize, seed: u64) -> Vec<NoisyTitle> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut titles = Vec::with_capacity(count);

    for _ in 0..count {
        let (brand, model) = CATALOG[rng.random_range(0..CATALOG.len())];
        let mut title = String::new();
        if rng.random_bool(0.6) {
            title.push_str(brand);
            title.push(' ');
        }
        title.push_str(model);
        if rng.random_bool(0.7) {
            title.push_str(" Snowboard");
        }
        if rng.random_bool(0.5) {
            let year = rng.random_range(2019..=2026);
            if rng.random_bool(0.5) {
                title.push_str(&format!(" {}", year));
            } else {
                title.push_str(&format!(" {}/{}", year - 1, year % 100));
            }
        }
        if rng.random_bool(0.3) {
            let length = rng.random_range(140..=165);
            title.push_str(&format!(" {}", length));
            if rng.random_bool(0.3) {
                title.push('W');
            }
        }
        if rng.random_bool(0.15) {
            title.push_str(" (Closeout)");
        }
        titles.push(NoisyTitle { brand, model, title });
    }

    titles
}

/// Scraped retailer records for the generated titles, one listing each.
pub fn generate_batch(count: usize, seed: u64) -> Vec<ScrapedBoard> {
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
    generate_titles(count, seed)
        .into_iter()
        .enumerate()
        .map(|(i, noisy)| {
            let retailer = RETAILERS[rng.random_range(0..RETAILERS.len())];
            let price = rng.random_range(300..900) as f64 - 0.05;
            let listing = Listing::new(
                &format!("{}-{:06}", retailer, i),
                retailer,
                &format!("https://{}.example/p/{:06}", retailer, i),
                price,
            )
            .with_length(rng.random_range(148..=162) as f32);
            ScrapedBoard::new(&format!("retailer:{}", retailer), noisy.brand, &noisy.title)
                .with_url(&format!("https://{}.example/p/{:06}", retailer, i))
                .with_listing(listing)
        })
        .collect()
}

/// Three retailer "Burton Custom" listings plus the manufacturer's Custom Camber page.
pub fn burton_custom_batch() -> Vec<ScrapedBoard> {
    let mut records: Vec<ScrapedBoard> = [155.0, 158.0, 161.0]
        .into_iter()
        .enumerate()
        .map(|(i, length)| {
            let retailer = RETAILERS[i];
            let listing = Listing::new(
                &format!("{}-custom-{}", retailer, length),
                retailer,
                &format!("https://{}.example/burton-custom", retailer),
                649.95,
            )
            .with_length(length);
            ScrapedBoard::new(
                &format!("retailer:{}", retailer),
                "Burton",
                &format!("Burton Custom Snowboard 2026 {}", length),
            )
            .with_listing(listing)
        })
        .collect();

    let mut camber = ScrapedBoard::new("manufacturer:burton", "Burton", "Custom Camber")
        .with_url("https://www.burton.example/custom-camber");
    camber.profile = Some("Camber".to_string());
    camber.flex = Some(6.0);
    records.push(camber);
    records
}
