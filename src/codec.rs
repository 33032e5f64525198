use crate::entities::Point;
use crate::error::{malformed_coordinate_error, Error};

pub fn parse(text: &str) -> Result<Point, Error> {
    let mut tokens = text.split(',');

    let (lat, lng) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(lat), Some(lng), None) => (lat.trim(), lng.trim()),
        _ => return Err(malformed_coordinate_error()),
    };

    let latitude = parse_degrees(lat)?;
    let longitude = parse_degrees(lng)?;

    Point::new(latitude, longitude)
}

pub fn format(point: &Point) -> String {
    format!("{:.6},{:.6}", point.latitude, point.longitude)
}

fn parse_degrees(token: &str) -> Result<f64, Error> {
    // f64::from_str also accepts "inf" and "NaN"
    let looks_numeric = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'));

    if !looks_numeric {
        return Err(malformed_coordinate_error());
    }

    token.parse::<f64>().map_err(|_| malformed_coordinate_error())
}

#[test]
fn parse_valid_test() {
    let point = parse("-6.2088,106.8456").unwrap();

    assert_eq!(point.latitude, -6.2088);
    assert_eq!(point.longitude, 106.8456);

    let spaced = parse(" -6.2088 , 106.8456 ").unwrap();
    assert_eq!(spaced, point);
}

#[test]
fn parse_single_token_test() {
    let err = parse("6.2088").unwrap_err();

    assert_eq!(err.code, crate::error::MALFORMED_COORDINATE);
}

#[test]
fn parse_rejects_garbage_test() {
    for text in [
        "",
        ",",
        "1,2,3",
        "abc,106.8",
        "-6.2,",
        "NaN,106.8",
        "-6.2,inf",
        "91,0",
        "0,-180.5",
    ] {
        assert!(parse(text).is_err(), "{:?} should not parse", text);
    }
}

#[test]
fn format_fixed_precision_test() {
    let point = Point::new(-6.2, 106.8).unwrap();

    assert_eq!(format(&point), "-6.200000,106.800000");
}

#[test]
fn round_trip_within_micro_degree_test() {
    let samples = [
        (-6.2088, 106.8456),
        (0.0, 0.0),
        (89.9999994, -179.9999996),
        (-45.1234567, 12.3456789),
        (1e-7, -1e-7),
    ];

    for (lat, lng) in samples {
        let point = Point::new(lat, lng).unwrap();
        let back = parse(&format(&point)).unwrap();

        assert!((back.latitude - point.latitude).abs() <= 1e-6);
        assert!((back.longitude - point.longitude).abs() <= 1e-6);
    }
}
