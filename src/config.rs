use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::codec;
use crate::entities::Point;
use crate::error::{invalid_field_error, Error};
use crate::surface::{Size, TileLayer};
use crate::viewport::DEFAULT_PADDING;

#[derive(Clone, Debug, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub page_size: u32,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, Error> {
        let base_url = env::var("ROADLINE_API_BASE")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: optional_var("ROADLINE_API_TOKEN")?,
            page_size: parsed_var("ROADLINE_PAGE_SIZE")?.unwrap_or(100),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapConfig {
    pub center: Point,
    pub zoom: f64,
    pub fit_padding: f64,
    pub tiles: TileLayer,
    pub container_size: Size,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: Point {
                latitude: -6.2088,
                longitude: 106.8456,
            },
            zoom: 10.0,
            fit_padding: DEFAULT_PADDING,
            tiles: TileLayer::default(),
            container_size: Size::new(1280, 720),
            retry_attempts: 10,
            retry_delay: Duration::from_millis(50),
        }
    }
}

impl MapConfig {
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(center) = optional_var("ROADLINE_MAP_CENTER")? {
            config.center = codec::parse(&center)
                .map_err(|_| invalid_field_error("ROADLINE_MAP_CENTER", "expected lat,lng"))?;
        }
        if let Some(zoom) = parsed_var("ROADLINE_MAP_ZOOM")? {
            config.zoom = zoom;
        }
        if let Some(padding) = parsed_var("ROADLINE_FIT_PADDING")? {
            config.fit_padding = padding;
        }
        if let Some(url_template) = optional_var("ROADLINE_TILE_URL")? {
            config.tiles.url_template = url_template;
        }

        let width = parsed_var("ROADLINE_MAP_WIDTH")?.unwrap_or(config.container_size.width);
        let height = parsed_var("ROADLINE_MAP_HEIGHT")?.unwrap_or(config.container_size.height);
        config.container_size = Size::new(width, height);

        Ok(config)
    }
}

fn optional_var(name: &str) -> Result<Option<String>, Error> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parsed_var<T: FromStr>(name: &str) -> Result<Option<T>, Error> {
    match optional_var(name)? {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid_field_error(name, "not a valid number")),
        None => Ok(None),
    }
}

#[test]
fn map_config_from_env_test() {
    env::set_var("ROADLINE_MAP_CENTER", "-7.25,112.75");
    env::set_var("ROADLINE_MAP_ZOOM", "12");
    env::set_var("ROADLINE_MAP_WIDTH", "640");

    let config = MapConfig::from_env().unwrap();

    assert_eq!(config.center, Point::new(-7.25, 112.75).unwrap());
    assert_eq!(config.zoom, 12.0);
    assert_eq!(config.container_size, Size::new(640, 720));
    assert_eq!(config.fit_padding, DEFAULT_PADDING);

    env::set_var("ROADLINE_MAP_ZOOM", "close");
    assert_eq!(MapConfig::from_env().unwrap_err().code, 101);

    env::remove_var("ROADLINE_MAP_CENTER");
    env::remove_var("ROADLINE_MAP_ZOOM");
    env::remove_var("ROADLINE_MAP_WIDTH");
}

#[test]
fn api_config_requires_base_test() {
    env::remove_var("ROADLINE_API_BASE");
    assert_eq!(ApiConfig::from_env().unwrap_err().code, 1);

    env::set_var("ROADLINE_API_BASE", "http://localhost:8000/api/");
    let config = ApiConfig::from_env().unwrap();
    assert_eq!(config.base_url, "http://localhost:8000/api");
    assert_eq!(config.page_size, 100);
    env::remove_var("ROADLINE_API_BASE");
}
