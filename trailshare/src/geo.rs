//! Distance helpers for location-aware listing queries.

const EARTH_RADIUS_KM: f64 = 6371.0;
const KM_PER_DEGREE_LAT: f64 = 111.32;

/// Great-circle distance in kilometres
#[must_use]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Box that contains every point within `radius_km` of the centre.
    ///
    /// Near the poles or across the antimeridian the longitude span widens to
    /// the full range rather than wrapping.
    #[must_use]
    pub fn around(lat: f64, lng: f64, radius_km: f64) -> Self {
        let d_lat = radius_km / KM_PER_DEGREE_LAT;
        let min_lat = (lat - d_lat).max(-90.0);
        let max_lat = (lat + d_lat).min(90.0);

        let cos_lat = lat.to_radians().cos();
        let (min_lng, max_lng) = if cos_lat < 1e-6 || min_lat <= -90.0 || max_lat >= 90.0 {
            (-180.0, 180.0)
        } else {
            let d_lng = radius_km / (KM_PER_DEGREE_LAT * cos_lat);
            let (lo, hi) = (lng - d_lng, lng + d_lng);
            if lo < -180.0 || hi > 180.0 {
                (-180.0, 180.0)
            } else {
                (lo, hi)
            }
        };

        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lng..=self.max_lng).contains(&lng)
    }
}

/// A search centre; only meaningful when all three parts are present
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: f64,
}

impl RadiusQuery {
    /// `None` unless latitude, longitude and a positive radius are all given
    #[must_use]
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>, radius_km: Option<f64>) -> Option<Self> {
        match (lat, lng, radius_km) {
            (Some(lat), Some(lng), Some(radius_km))
                if (-90.0..=90.0).contains(&lat)
                    && (-180.0..=180.0).contains(&lng)
                    && radius_km > 0.0 =>
            {
                Some(Self { lat, lng, radius_km })
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::around(self.lat, self.lng, self.radius_km)
    }

    #[must_use]
    pub fn distance_to(&self, lat: f64, lng: f64) -> f64 {
        haversine_km(self.lat, self.lng, lat, lng)
    }
}
