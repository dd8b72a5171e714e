//! Display strings for route distance and duration.

pub fn format_distance(meters: f64) -> String {
    let meters = meters.round();
    if meters < 1000.0 {
        return format!("{:.0} m", meters);
    }

    format!("{:.1} km", meters / 1000.0)
}

pub fn format_duration(seconds: f64) -> String {
    let minutes = (seconds.max(0.0) / 60.0).floor() as u64;

    if minutes < 60 {
        return format!("{} phút", minutes);
    }

    let hours = minutes / 60;
    let remaining_minutes = minutes % 60;

    if remaining_minutes == 0 {
        return format!("{} giờ", hours);
    }

    format!("{} giờ {} phút", hours, remaining_minutes)
}

#[test]
fn distance_text() {
    assert_eq!(format_distance(850.0), "850 m");
    assert_eq!(format_distance(0.0), "0 m");
    assert_eq!(format_distance(1500.0), "1.5 km");
    assert_eq!(format_distance(3800.0), "3.8 km");
    assert_eq!(format_distance(999.4), "999 m");
    assert_eq!(format_distance(999.6), "1.0 km");
}

#[test]
fn duration_text() {
    assert_eq!(format_duration(45.0), "0 phút");
    assert_eq!(format_duration(8.0 * 60.0), "8 phút");
    assert_eq!(format_duration(125.0 * 60.0), "2 giờ 5 phút");
    assert_eq!(format_duration(180.0 * 60.0), "3 giờ");
}
