//! On-screen joystick
//!
//! Turns pointer samples into a [`DisplacementVector`]. The handle is limited
//! with an axis-wise test against a vector of length `radius` rotated a quarter
//! turn from the drag direction, and the reported displacement is that vector
//! itself. Deployed firmware is tuned against exactly this output; it is not a
//! circular clamp.

use crate::domain::models::{DisplacementVector, JoystickView, Point};
use std::f64::consts::FRAC_PI_2;

/// Pad layout in pad coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoystickGeometry {
    pub background_center: Point,
    pub background_height: f64,
    /// Edge length of the square hit region around the handle.
    pub handle_size: f64,
}

impl JoystickGeometry {
    /// A square pad whose background fills the whole area.
    pub fn square(background_size: f64, handle_size: f64) -> Self {
        Self {
            background_center: Point::new(background_size / 2.0, background_size / 2.0),
            background_height: background_size,
            handle_size,
        }
    }

    pub fn radius(&self) -> f64 {
        self.background_height / 4.0
    }
}

pub struct JoystickInput {
    geometry: JoystickGeometry,
    active: bool,
    last_position: Point,
    handle_center: Point,
    displacement: DisplacementVector,
}

impl JoystickInput {
    pub fn new(geometry: JoystickGeometry) -> Self {
        Self {
            geometry,
            active: false,
            last_position: Point::default(),
            handle_center: geometry.background_center,
            displacement: DisplacementVector::ZERO,
        }
    }

    pub fn on_touch_begin(&mut self, point: Point) {
        if self.handle_contains(point) {
            self.active = true;
            self.last_position = point;
            self.displacement = DisplacementVector::ZERO;
        } else {
            self.active = false;
        }
    }

    pub fn on_touch_move(&mut self, point: Point) {
        if !self.active {
            return;
        }

        let delta_x = point.x - self.last_position.x;
        let delta_y = point.y - self.last_position.y;
        self.last_position = point;

        let proposed = Point::new(self.handle_center.x + delta_x, self.handle_center.y + delta_y);
        let center = self.geometry.background_center;
        let vx = proposed.x - center.x;
        let vy = proposed.y - center.y;
        let angle = vy.atan2(vx);

        let radius = self.geometry.radius();
        let clamp_x = (angle - FRAC_PI_2).sin() * radius;
        let clamp_y = (angle - FRAC_PI_2).cos() * radius;

        if vx.abs() < clamp_x.abs() && vy.abs() < clamp_y.abs() {
            self.handle_center = proposed;
        } else {
            self.handle_center = Point::new(center.x - clamp_x, center.y + clamp_y);
        }

        self.displacement = DisplacementVector::new(clamp_x, clamp_y);
    }

    pub fn on_touch_end(&mut self) {
        if self.active {
            self.release();
        }
    }

    /// Drops any touch in progress and recenters the handle.
    pub fn release(&mut self) {
        self.active = false;
        self.displacement = DisplacementVector::ZERO;
        self.handle_center = self.geometry.background_center;
    }

    pub fn displacement(&self) -> DisplacementVector {
        if self.active {
            self.displacement
        } else {
            DisplacementVector::ZERO
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn handle_center(&self) -> Point {
        self.handle_center
    }

    pub fn view(&self) -> JoystickView {
        JoystickView {
            active: self.active,
            handle_center: self.handle_center,
            displacement: self.displacement(),
        }
    }

    fn handle_contains(&self, point: Point) -> bool {
        let half = self.geometry.handle_size / 2.0;
        let min_x = self.handle_center.x - half;
        let min_y = self.handle_center.y - half;
        point.x >= min_x
            && point.x < min_x + self.geometry.handle_size
            && point.y >= min_y
            && point.y < min_y + self.geometry.handle_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn joystick() -> JoystickInput {
        // radius 50, handle 60x60 around (100, 100)
        JoystickInput::new(JoystickGeometry::square(200.0, 60.0))
    }

    #[test]
    fn test_begin_outside_handle_stays_inactive() {
        let mut js = joystick();
        js.on_touch_begin(Point::new(10.0, 10.0));
        assert!(!js.is_active());

        js.on_touch_move(Point::new(0.0, 0.0));
        assert_eq!(js.displacement(), DisplacementVector::ZERO);
        assert_eq!(js.handle_center(), Point::new(100.0, 100.0));
    }

    #[test]
    fn test_drag_up_snaps_to_boundary() {
        let mut js = joystick();
        js.on_touch_begin(Point::new(100.0, 100.0));
        assert!(js.is_active());

        js.on_touch_move(Point::new(100.0, 40.0));
        let d = js.displacement();
        assert!(d.dx.abs() < EPS);
        assert!((d.dy + 50.0).abs() < EPS);

        let handle = js.handle_center();
        assert!((handle.x - 100.0).abs() < EPS);
        assert!((handle.y - 50.0).abs() < EPS);
    }

    #[test]
    fn test_drag_left_reports_positive_dx() {
        let mut js = joystick();
        js.on_touch_begin(Point::new(100.0, 100.0));
        js.on_touch_move(Point::new(30.0, 100.0));

        let d = js.displacement();
        assert!((d.dx - 50.0).abs() < EPS);
        assert!(d.dy.abs() < EPS);
        assert!((js.handle_center().x - 50.0).abs() < EPS);
    }

    #[test]
    fn test_small_move_inside_bound_moves_handle() {
        let mut js = joystick();
        js.on_touch_begin(Point::new(100.0, 100.0));
        js.on_touch_move(Point::new(105.0, 103.0));

        assert_eq!(js.handle_center(), Point::new(105.0, 103.0));

        // The reported vector always sits on the radius.
        let d = js.displacement();
        assert!(((d.dx * d.dx + d.dy * d.dy).sqrt() - 50.0).abs() < EPS);
    }

    #[test]
    fn test_displacement_stays_within_radius_per_axis() {
        let mut js = joystick();
        js.on_touch_begin(Point::new(95.0, 105.0));

        let path = [
            (140.0, 180.0),
            (300.0, -20.0),
            (-50.0, 60.0),
            (99.0, 101.0),
            (250.0, 250.0),
            (0.0, 0.0),
        ];
        for (x, y) in path {
            js.on_touch_move(Point::new(x, y));
            let d = js.displacement();
            assert!(d.dx.abs() <= 50.0 + EPS);
            assert!(d.dy.abs() <= 50.0 + EPS);
        }
    }

    #[test]
    fn test_touch_end_resets() {
        let mut js = joystick();
        js.on_touch_begin(Point::new(100.0, 100.0));
        js.on_touch_move(Point::new(100.0, 180.0));
        assert_ne!(js.displacement(), DisplacementVector::ZERO);

        js.on_touch_end();
        assert!(!js.is_active());
        assert_eq!(js.displacement(), DisplacementVector::ZERO);
        assert_eq!(js.handle_center(), Point::new(100.0, 100.0));
    }

    #[test]
    fn test_begin_on_handle_zeroes_previous_displacement() {
        let mut js = joystick();
        js.on_touch_begin(Point::new(100.0, 100.0));
        js.on_touch_move(Point::new(100.0, 140.0));
        // The handle snapped to (100, 150); grab it there again.
        js.on_touch_begin(Point::new(100.0, 150.0));
        assert!(js.is_active());
        assert_eq!(js.displacement(), DisplacementVector::ZERO);
    }
}
