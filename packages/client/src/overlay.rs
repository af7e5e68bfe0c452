//! Exclusive route/isochrone overlay on a map surface.
//!
//! The map shows at most one overlay at a time. [`OverlayController`]
//! remembers every layer it added for the current overlay and removes all
//! of them before anything new is drawn, so switching modes never leaves
//! stale polylines, polygons or markers behind.

use geo::BoundingRect;
use safe_route_database_models::{MAX_NEARBY_DISTANCE_M, SafetyTier};
use safe_route_geo::{BoundingBox, GeoError, GeoPoint};
use safe_route_routing::response::{IsochroneResponse, RouteResponse};
use safe_route_routing::{IsochroneRequest, RouteRequest};
use safe_route_server_models::ApiNearbyReview;

use crate::ClientError;

/// Reviews within this distance of a route are drawn as waypoints.
pub const WAYPOINT_CORRIDOR_M: f64 = 150.0;

/// Route line colour.
pub const ROUTE_COLOR: &str = "#3B82F6";
/// Isochrone fill colour.
pub const ISOCHRONE_COLOR: &str = "#8B5CF6";
/// Marker colour at the start of a route.
pub const START_COLOR: &str = "#22C55E";
/// Marker colour at the end of a route.
pub const END_COLOR: &str = "#DC2626";

/// Handle to something drawn on a [`MapSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u64);

/// Something that can be drawn on the map.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    /// A polyline.
    Line {
        /// Vertices in drawing order.
        points: Vec<GeoPoint>,
        /// CSS colour.
        color: &'static str,
    },
    /// A filled polygon.
    Area {
        /// Closed outer ring.
        ring: Vec<GeoPoint>,
        /// CSS fill colour.
        color: &'static str,
    },
    /// A labelled point marker.
    Marker {
        /// Where the marker sits.
        position: GeoPoint,
        /// Popup text.
        label: String,
        /// CSS colour.
        color: &'static str,
    },
}

/// The map widget being drawn on.
pub trait MapSurface {
    /// Draws `layer` and returns a handle for removing it.
    fn add_layer(&mut self, layer: Layer) -> LayerId;

    /// Removes a previously added layer. Unknown ids are ignored.
    fn remove_layer(&mut self, id: LayerId);
}

/// Where overlay data comes from.
#[async_trait::async_trait]
pub trait MapDataSource: Send + Sync {
    /// Fetches a route.
    async fn route(&self, request: &RouteRequest) -> Result<RouteResponse, ClientError>;

    /// Fetches an isochrone.
    async fn isochrone(&self, request: &IsochroneRequest)
    -> Result<IsochroneResponse, ClientError>;

    /// Reviews within `max_distance_m` of `center`.
    async fn nearby(
        &self,
        center: GeoPoint,
        max_distance_m: f64,
    ) -> Result<Vec<ApiNearbyReview>, ClientError>;
}

/// The overlay the user asked for. Mode, profile, destination and time
/// limit all live here, so any change compares unequal to the last one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OverlayRequest {
    /// Nothing drawn.
    #[default]
    None,
    /// A route with waypoints along it.
    Route(RouteRequest),
    /// A reachable area around a point.
    Isochrone(IsochroneRequest),
}

/// Layers currently owned by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Overlay {
    /// Nothing drawn.
    #[default]
    None,
    /// A route line with its start, end and waypoint markers.
    Route {
        /// The route line.
        line: LayerId,
        /// Start and end markers followed by waypoints.
        markers: Vec<LayerId>,
    },
    /// An isochrone area with its time label.
    Isochrone {
        /// The filled area.
        polygon: LayerId,
        /// Marker showing the time limit.
        label: LayerId,
    },
}

impl Overlay {
    /// Every layer belonging to this overlay.
    #[must_use]
    pub fn layers(&self) -> Vec<LayerId> {
        match self {
            Self::None => Vec::new(),
            Self::Route { line, markers } => std::iter::once(*line)
                .chain(markers.iter().copied())
                .collect(),
            Self::Isochrone { polygon, label } => vec![*polygon, *label],
        }
    }
}

/// A review close enough to the route to be marked along it.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    /// The review's location.
    pub position: GeoPoint,
    /// Route name shown on the marker.
    pub label: String,
    /// Decides the marker colour.
    pub tier: SafetyTier,
}

struct RouteShape {
    path: Vec<GeoPoint>,
    waypoints: Vec<Waypoint>,
}

struct IsochroneShape {
    ring: Vec<GeoPoint>,
    label: String,
    label_at: GeoPoint,
}

enum Shape {
    None,
    Route(RouteShape),
    Isochrone(IsochroneShape),
}

/// Keeps a single overlay on `S`, fed from `P`.
pub struct OverlayController<S, P> {
    surface: S,
    source: P,
    overlay: Overlay,
    applied: Option<OverlayRequest>,
}

#[allow(clippy::future_not_send)]
impl<S: MapSurface, P: MapDataSource> OverlayController<S, P> {
    /// Starts with nothing drawn on `surface`.
    pub const fn new(surface: S, source: P) -> Self {
        Self {
            surface,
            source,
            overlay: Overlay::None,
            applied: Some(OverlayRequest::None),
        }
    }

    /// Layers currently drawn.
    #[must_use]
    pub const fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// The map being drawn on.
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    /// Shows the overlay described by `request`.
    ///
    /// Re-applying the request that is already shown does nothing. Otherwise
    /// the new data is fetched, every layer of the current overlay is
    /// removed, and the new overlay is drawn.
    ///
    /// # Errors
    ///
    /// Returns the fetch or decode error. The previous overlay has already
    /// been removed by then and the map is left empty.
    pub async fn apply(&mut self, request: OverlayRequest) -> Result<(), ClientError> {
        if self.applied == Some(request) {
            log::trace!("Overlay unchanged: {request:?}");
            return Ok(());
        }

        let shape = match &request {
            OverlayRequest::None => Ok(Shape::None),
            OverlayRequest::Route(route) => self.fetch_route(route).await.map(Shape::Route),
            OverlayRequest::Isochrone(iso) => {
                self.fetch_isochrone(iso).await.map(Shape::Isochrone)
            }
        };

        self.clear();

        match shape {
            Ok(shape) => {
                self.overlay = self.draw(shape);
                self.applied = Some(request);
                Ok(())
            }
            Err(e) => {
                log::warn!("Failed to load overlay: {e}");
                self.applied = None;
                Err(e)
            }
        }
    }

    /// Removes every layer of the current overlay.
    pub fn clear(&mut self) {
        for id in std::mem::take(&mut self.overlay).layers() {
            self.surface.remove_layer(id);
        }
        self.applied = Some(OverlayRequest::None);
    }

    async fn fetch_route(&self, request: &RouteRequest) -> Result<RouteShape, ClientError> {
        let response = self.source.route(request).await?;
        let path = response.best().ok_or(ClientError::NoRoute)?.geometry()?;
        if path.is_empty() {
            return Err(ClientError::NoRoute);
        }

        let waypoints = self.waypoints_along(&path).await;
        Ok(RouteShape { path, waypoints })
    }

    async fn waypoints_along(&self, path: &[GeoPoint]) -> Vec<Waypoint> {
        let Some(bbox) = BoundingBox::from_points(path.iter().copied()) else {
            return Vec::new();
        };
        let radius = (bbox.half_diagonal_meters() + WAYPOINT_CORRIDOR_M).min(MAX_NEARBY_DISTANCE_M);

        match self.source.nearby(bbox.center(), radius).await {
            Ok(reviews) => waypoints_near(path, reviews),
            Err(e) => {
                log::warn!("Could not load reviews along route: {e}");
                Vec::new()
            }
        }
    }

    async fn fetch_isochrone(
        &self,
        request: &IsochroneRequest,
    ) -> Result<IsochroneShape, ClientError> {
        let response = self.source.isochrone(request).await?;
        let feature = response
            .polygons
            .first()
            .ok_or(ClientError::NoIsochrone)?;

        let polygon = parse_polygon(&feature.geometry)?;
        let center = polygon
            .bounding_rect()
            .ok_or(ClientError::NoIsochrone)?
            .center();
        let ring = polygon
            .exterior()
            .coords()
            .map(|c| GeoPoint::new(c.y, c.x))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(IsochroneShape {
            ring,
            label: request.label(),
            label_at: GeoPoint::new(center.y, center.x)?,
        })
    }

    fn draw(&mut self, shape: Shape) -> Overlay {
        match shape {
            Shape::None => Overlay::None,
            Shape::Route(route) => {
                let (Some(&start), Some(&end)) = (route.path.first(), route.path.last()) else {
                    return Overlay::None;
                };
                let line = self.surface.add_layer(Layer::Line {
                    points: route.path,
                    color: ROUTE_COLOR,
                });

                let mut markers = vec![
                    self.surface.add_layer(Layer::Marker {
                        position: start,
                        label: "Start".to_string(),
                        color: START_COLOR,
                    }),
                    self.surface.add_layer(Layer::Marker {
                        position: end,
                        label: "Destination".to_string(),
                        color: END_COLOR,
                    }),
                ];
                markers.extend(route.waypoints.into_iter().map(|w| {
                    self.surface.add_layer(Layer::Marker {
                        position: w.position,
                        label: w.label,
                        color: w.tier.color(),
                    })
                }));

                Overlay::Route { line, markers }
            }
            Shape::Isochrone(iso) => {
                let polygon = self.surface.add_layer(Layer::Area {
                    ring: iso.ring,
                    color: ISOCHRONE_COLOR,
                });
                let label = self.surface.add_layer(Layer::Marker {
                    position: iso.label_at,
                    label: iso.label,
                    color: ISOCHRONE_COLOR,
                });
                Overlay::Isochrone { polygon, label }
            }
        }
    }
}

/// Reviews within [`WAYPOINT_CORRIDOR_M`] of any segment of `path`.
#[must_use]
pub fn waypoints_near(path: &[GeoPoint], reviews: Vec<ApiNearbyReview>) -> Vec<Waypoint> {
    reviews
        .into_iter()
        .filter_map(|nearby| {
            let review = nearby.review;
            let position = review.point().ok()?;
            let distance = position.distance_to_path_meters(path)?;
            (distance <= WAYPOINT_CORRIDOR_M).then(|| Waypoint {
                position,
                label: review.route_name,
                tier: review.safety_tier,
            })
        })
        .collect()
}

fn parse_polygon(value: &serde_json::Value) -> Result<geo::Polygon<f64>, ClientError> {
    let geometry: geojson::Geometry =
        serde_json::from_value(value.clone()).map_err(|e| GeoError::Geometry {
            message: e.to_string(),
        })?;
    let polygon: geo::Polygon<f64> =
        geometry
            .value
            .try_into()
            .map_err(|e: geojson::Error| GeoError::Geometry {
                message: e.to_string(),
            })?;
    Ok(polygon)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use safe_route_routing::Profile;
    use safe_route_server_models::{ApiLocation, ApiReview};
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct FakeSurface {
        next: u64,
        live: BTreeMap<LayerId, Layer>,
    }

    impl FakeSurface {
        fn lines(&self) -> usize {
            self.live
                .values()
                .filter(|l| matches!(l, Layer::Line { .. }))
                .count()
        }

        fn areas(&self) -> usize {
            self.live
                .values()
                .filter(|l| matches!(l, Layer::Area { .. }))
                .count()
        }

        fn marker_labels(&self) -> Vec<&str> {
            self.live
                .values()
                .filter_map(|l| match l {
                    Layer::Marker { label, .. } => Some(label.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl MapSurface for FakeSurface {
        fn add_layer(&mut self, layer: Layer) -> LayerId {
            self.next += 1;
            let id = LayerId(self.next);
            self.live.insert(id, layer);
            id
        }

        fn remove_layer(&mut self, id: LayerId) {
            self.live.remove(&id);
        }
    }

    #[derive(Default)]
    struct FakeSource {
        calls: AtomicUsize,
        fail: Mutex<bool>,
        reviews: Vec<ApiNearbyReview>,
    }

    impl FakeSource {
        fn fail_next(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        fn check(&self) -> Result<(), ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail.lock().unwrap() {
                Err(ClientError::Api {
                    status: 500,
                    message: "Failed to get route information".to_string(),
                    error: None,
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait::async_trait]
    impl MapDataSource for FakeSource {
        async fn route(&self, _request: &RouteRequest) -> Result<RouteResponse, ClientError> {
            self.check()?;
            // (38.5,-120.2) (40.7,-120.95) (43.252,-126.453)
            Ok(serde_json::from_value(json!({
                "paths": [{ "distance": 1.0, "time": 1, "points": "_p~iF~ps|U_ulLnnqC_mqNvxq`@" }]
            }))
            .unwrap())
        }

        async fn isochrone(
            &self,
            _request: &IsochroneRequest,
        ) -> Result<IsochroneResponse, ClientError> {
            self.check()?;
            Ok(serde_json::from_value(json!({
                "polygons": [{
                    "properties": { "bucket": 0 },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[13.0, 52.0], [13.2, 52.0], [13.2, 52.2], [13.0, 52.2], [13.0, 52.0]]]
                    }
                }]
            }))
            .unwrap())
        }

        async fn nearby(
            &self,
            _center: GeoPoint,
            _max_distance_m: f64,
        ) -> Result<Vec<ApiNearbyReview>, ClientError> {
            Ok(self.reviews.clone())
        }
    }

    fn point(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng).unwrap()
    }

    fn review(name: &str, rating: u8, at: GeoPoint) -> ApiNearbyReview {
        let tier = match rating {
            5 => SafetyTier::Safe,
            3 | 4 => SafetyTier::Caution,
            _ => SafetyTier::Avoid,
        };
        ApiNearbyReview {
            review: ApiReview {
                id: 1,
                user_id: 1,
                author_name: None,
                route_name: name.to_string(),
                content: String::new(),
                rating,
                safety_tier: tier,
                location: ApiLocation::from(at),
                likes: 0,
                dislikes: 0,
                liked_by: Vec::new(),
                disliked_by: Vec::new(),
                created_at: chrono::Utc::now(),
            },
            distance_meters: 0.0,
        }
    }

    fn route_request(profile: Profile) -> OverlayRequest {
        OverlayRequest::Route(RouteRequest {
            start: point(38.5, -120.2),
            end: point(43.252, -126.453),
            profile,
        })
    }

    fn isochrone_request(time_limit_secs: u32) -> OverlayRequest {
        OverlayRequest::Isochrone(IsochroneRequest {
            center: point(52.1, 13.1),
            time_limit_secs,
            profile: Profile::Foot,
        })
    }

    #[tokio::test]
    async fn switching_route_to_isochrone_leaves_no_route_layers() {
        let mut controller =
            OverlayController::new(FakeSurface::default(), FakeSource::default());

        controller.apply(route_request(Profile::Foot)).await.unwrap();
        assert_eq!(controller.surface().lines(), 1);
        let route_layers = controller.overlay().layers();

        controller.apply(isochrone_request(600)).await.unwrap();
        let surface = controller.surface();
        assert_eq!(surface.lines(), 0);
        assert_eq!(surface.areas(), 1);
        assert_eq!(surface.marker_labels(), vec!["10 min walking"]);
        assert!(route_layers.iter().all(|id| !surface.live.contains_key(id)));
        assert!(matches!(controller.overlay(), Overlay::Isochrone { .. }));
    }

    #[tokio::test]
    async fn identical_request_is_a_no_op() {
        let mut controller =
            OverlayController::new(FakeSurface::default(), FakeSource::default());

        controller.apply(route_request(Profile::Foot)).await.unwrap();
        let before = controller.overlay().clone();
        controller.apply(route_request(Profile::Foot)).await.unwrap();

        assert_eq!(controller.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(controller.overlay(), &before);

        controller.apply(route_request(Profile::Bike)).await.unwrap();
        assert_eq!(controller.source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(controller.surface().lines(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_tears_down_stale_overlay() {
        let mut controller =
            OverlayController::new(FakeSurface::default(), FakeSource::default());

        controller.apply(isochrone_request(600)).await.unwrap();
        controller.source.fail_next(true);

        let err = controller.apply(route_request(Profile::Foot)).await;
        assert!(matches!(err, Err(ClientError::Api { status: 500, .. })));
        assert!(controller.surface().live.is_empty());
        assert_eq!(controller.overlay(), &Overlay::None);

        controller.source.fail_next(false);
        controller.apply(route_request(Profile::Foot)).await.unwrap();
        assert_eq!(controller.surface().lines(), 1);
    }

    #[tokio::test]
    async fn route_marks_only_reviews_inside_the_corridor() {
        let on_route = point(40.7, -120.95);
        let source = FakeSource {
            reviews: vec![
                review("Vertex", 5, on_route),
                review("Just off", 2, on_route.offset_north(100.0)),
                review("Far away", 3, on_route.offset_north(5_000.0)),
            ],
            ..FakeSource::default()
        };
        let mut controller = OverlayController::new(FakeSurface::default(), source);

        controller.apply(route_request(Profile::Foot)).await.unwrap();

        let mut labels = controller.surface().marker_labels();
        labels.sort_unstable();
        assert_eq!(labels, vec!["Destination", "Just off", "Start", "Vertex"]);
        let Overlay::Route { markers, .. } = controller.overlay() else {
            panic!("expected route overlay");
        };
        assert_eq!(markers.len(), 4);
    }

    #[tokio::test]
    async fn clearing_removes_everything() {
        let mut controller =
            OverlayController::new(FakeSurface::default(), FakeSource::default());
        controller.apply(route_request(Profile::Car)).await.unwrap();

        controller.apply(OverlayRequest::None).await.unwrap();
        assert!(controller.surface().live.is_empty());
        assert_eq!(controller.overlay(), &Overlay::None);
    }

    #[test]
    fn waypoint_uses_tier_colour() {
        let path = [point(0.0, 0.0), point(0.0, 0.01)];
        let waypoints = waypoints_near(&path, vec![review("Mid", 1, point(0.0, 0.005))]);
        assert_eq!(waypoints.len(), 1);
        assert_eq!(waypoints[0].tier, SafetyTier::Avoid);
        assert_eq!(waypoints[0].tier.color(), "#EF4444");
    }
}
