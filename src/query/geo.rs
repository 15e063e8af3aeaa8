/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres between two `[lat, lon]` points.
pub fn haversine_km(a: [f64; 2], b: [f64; 2]) -> f64 {
    let (lat1, lat2) = (a[0].to_radians(), b[0].to_radians());
    let dlat = (b[0] - a[0]).to_radians();
    let dlon = (b[1] - a[1]).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// `bbox` is `[min_lat, min_lon, max_lat, max_lon]`, edges inclusive.
pub fn in_bounding_box(point: [f64; 2], bbox: [f64; 4]) -> bool {
    point[0] >= bbox[0] && point[0] <= bbox[2] && point[1] >= bbox[1] && point[1] <= bbox[3]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        let paris = [48.8566, 2.3522];
        let london = [51.5074, -0.1278];
        let d = haversine_km(paris, london);
        assert!((d - 343.5).abs() < 2.0, "got {}", d);
        assert_eq!(haversine_km(paris, paris), 0.0);
    }

    #[test]
    fn test_bounding_box() {
        let bbox = [35.0, 50.0, 36.0, 52.0];
        assert!(in_bounding_box([35.7, 51.4], bbox));
        assert!(in_bounding_box([35.0, 50.0], bbox));
        assert!(!in_bounding_box([34.9, 51.0], bbox));
        assert!(!in_bounding_box([35.5, 52.1], bbox));
    }
}
