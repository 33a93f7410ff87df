//! # Reviews
//!
//! Customers review products they actually received: the author needs a
//! `completed` order containing the product, and gets one review per product.
//! Each accepted review credits loyalty points to the author's profile.
//!
//! The `(product_id, user_id)` unique constraint on `reviews` is what makes it
//! one review per product. Points are only credited by the request whose
//! insert won.
//!
//! Points are a plain column on `profiles`, so crediting is a compare-and-set
//! PATCH (`points=eq.<old>`) retried a few times rather than a blind write.
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    accounts::PROFILES_TABLE,
    auth::AuthUser,
    catalog,
    error::AppError,
    orders::{self, Order},
    state::AppState,
    supabase::{Query, Supabase},
};

pub const REVIEWS_TABLE: &str = "reviews";
const MAX_COMMENT_CHARS: usize = 1000;
const CREDIT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub product_id: i64,
    pub user_id: String,
    pub author_name: Option<String>,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub rating: u8,
    pub comment: Option<String>,
}

impl ReviewRequest {
    pub fn validate(self) -> Result<Self, AppError> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::invalid("Rating must be between 1 and 5"));
        }

        let comment = self
            .comment
            .map(|comment| comment.trim().to_string())
            .filter(|comment| !comment.is_empty());

        if comment
            .as_ref()
            .is_some_and(|comment| comment.chars().count() > MAX_COMMENT_CHARS)
        {
            return Err(AppError::invalid("Comment is too long"));
        }

        Ok(Self {
            rating: self.rating,
            comment,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub average_rating: f64,
    pub count: usize,
    pub reviews: Vec<Review>,
}

pub fn summarize(reviews: Vec<Review>) -> ReviewSummary {
    let count = reviews.len();
    let average_rating = if count == 0 {
        0.0
    } else {
        let total: u32 = reviews.iter().map(|review| review.rating as u32).sum();
        (total as f64 / count as f64 * 10.0).round() / 10.0
    };

    ReviewSummary {
        average_rating,
        count,
        reviews,
    }
}

pub fn has_completed_purchase(orders: &[Order], product_id: i64) -> bool {
    orders.iter().any(|order| order.contains_product(product_id))
}

#[derive(Debug, Clone, Serialize)]
pub struct NewReview {
    pub product_id: i64,
    pub user_id: String,
    pub author_name: Option<String>,
    pub rating: u8,
    pub comment: Option<String>,
}

pub trait ReviewStore {
    /// Fails with [`AppError::Conflict`] when the author already reviewed the product.
    fn insert_review(&self, review: &NewReview) -> impl Future<Output = Result<Review, AppError>> + Send;
}

impl ReviewStore for Supabase {
    async fn insert_review(&self, review: &NewReview) -> Result<Review, AppError> {
        self.insert(REVIEWS_TABLE, review).await
    }
}

/// Where loyalty points live.
pub trait PointsStore {
    fn points(&self, user_id: &str) -> impl Future<Output = Result<i64, AppError>> + Send;

    /// Sets the balance to `new` only if it is still `expected`.
    fn compare_and_set(
        &self,
        user_id: &str,
        expected: i64,
        new: i64,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;
}

#[derive(Deserialize)]
struct PointsRow {
    points: i64,
}

impl PointsStore for Supabase {
    async fn points(&self, user_id: &str) -> Result<i64, AppError> {
        let row: PointsRow = self
            .select_one(PROFILES_TABLE, Query::new().select("points").eq("id", user_id))
            .await?
            .ok_or(AppError::NotFound("Profile"))?;

        Ok(row.points)
    }

    async fn compare_and_set(&self, user_id: &str, expected: i64, new: i64) -> Result<bool, AppError> {
        let rows: Vec<PointsRow> = self
            .update(
                PROFILES_TABLE,
                &Query::new().eq("id", user_id).eq("points", expected),
                &json!({ "points": new }),
            )
            .await?;

        Ok(!rows.is_empty())
    }
}

/// Adds `amount` points and returns the new balance.
pub async fn credit_points<S: PointsStore>(store: &S, user_id: &str, amount: i64) -> Result<i64, AppError> {
    for attempt in 1..=CREDIT_ATTEMPTS {
        let current = store.points(user_id).await?;
        let updated = current + amount;

        if store.compare_and_set(user_id, current, updated).await? {
            return Ok(updated);
        }

        warn!("Points for {user_id} changed underneath us, attempt {attempt}/{CREDIT_ATTEMPTS}");
    }

    Err(AppError::Conflict("Points balance is busy, try again".into()))
}

pub async fn list_for_product(state: &AppState, slug: &str) -> Result<ReviewSummary, AppError> {
    let product = catalog::product_by_slug(state, slug).await?;

    let reviews = state
        .supabase
        .select(
            REVIEWS_TABLE,
            &Query::new()
                .select("*")
                .eq("product_id", product.id)
                .order("created_at", false),
        )
        .await?;

    Ok(summarize(reviews))
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmittedReview {
    pub review: Review,
    pub points_awarded: i64,
    pub points_balance: Option<i64>,
}

pub async fn submit(
    state: &AppState,
    user: &AuthUser,
    slug: &str,
    request: ReviewRequest,
) -> Result<SubmittedReview, AppError> {
    let request = request.validate()?;
    let product = catalog::product_by_slug(state, slug).await?;

    let completed = orders::completed_for_user(state, &user.id).await?;
    if !has_completed_purchase(&completed, product.id) {
        return Err(AppError::Forbidden);
    }

    let existing: Option<Review> = state
        .supabase
        .select_one(
            REVIEWS_TABLE,
            Query::new()
                .select("*")
                .eq("product_id", product.id)
                .eq("user_id", &user.id),
        )
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("You already reviewed this product".into()));
    }

    let author_name = completed
        .iter()
        .find(|order| order.contains_product(product.id))
        .map(|order| order.customer_name.clone());

    let review = NewReview {
        product_id: product.id,
        user_id: user.id.clone(),
        author_name,
        rating: request.rating,
        comment: request.comment,
    };

    record_review(&state.supabase, &review, state.config.review_points).await
}

/// Stores the review, then credits points. A duplicate insert credits nothing.
pub async fn record_review<S>(store: &S, review: &NewReview, amount: i64) -> Result<SubmittedReview, AppError>
where
    S: ReviewStore + PointsStore,
{
    let review = match store.insert_review(review).await {
        Ok(review) => review,
        Err(AppError::Conflict(_)) => {
            return Err(AppError::Conflict("You already reviewed this product".into()));
        }
        Err(e) => return Err(e),
    };

    let points_balance = match credit_points(store, &review.user_id, amount).await {
        Ok(balance) => {
            info!("Credited {amount} points to {} for review {}", review.user_id, review.id);
            Some(balance)
        }
        Err(e) => {
            warn!("Review {} stored but points credit failed: {e}", review.id);
            None
        }
    };

    Ok(SubmittedReview {
        review,
        points_awarded: if points_balance.is_some() { amount } else { 0 },
        points_balance,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::orders::{OrderItem, OrderStatus};

    struct FakePoints {
        balance: Mutex<i64>,
        // Number of upcoming compare-and-set calls that lose a race.
        contention: Mutex<usize>,
    }

    impl FakePoints {
        fn new(balance: i64, contention: usize) -> Self {
            Self {
                balance: Mutex::new(balance),
                contention: Mutex::new(contention),
            }
        }
    }

    impl PointsStore for FakePoints {
        async fn points(&self, _user_id: &str) -> Result<i64, AppError> {
            Ok(*self.balance.lock().unwrap())
        }

        async fn compare_and_set(&self, _user_id: &str, expected: i64, new: i64) -> Result<bool, AppError> {
            let mut contention = self.contention.lock().unwrap();
            let mut balance = self.balance.lock().unwrap();

            if *contention > 0 {
                *contention -= 1;
                *balance += 1;
                return Ok(false);
            }

            if *balance != expected {
                return Ok(false);
            }

            *balance = new;
            Ok(true)
        }
    }

    struct FakeShop {
        points: FakePoints,
        reviews: Mutex<Vec<Review>>,
    }

    impl ReviewStore for FakeShop {
        async fn insert_review(&self, review: &NewReview) -> Result<Review, AppError> {
            let mut reviews = self.reviews.lock().unwrap();

            if reviews
                .iter()
                .any(|r| r.product_id == review.product_id && r.user_id == review.user_id)
            {
                return Err(AppError::Conflict("duplicate key value violates unique constraint".into()));
            }

            let stored = Review {
                id: reviews.len() as i64 + 1,
                product_id: review.product_id,
                user_id: review.user_id.clone(),
                author_name: review.author_name.clone(),
                rating: review.rating,
                comment: review.comment.clone(),
                created_at: None,
            };
            reviews.push(stored.clone());
            Ok(stored)
        }
    }

    impl PointsStore for FakeShop {
        async fn points(&self, user_id: &str) -> Result<i64, AppError> {
            self.points.points(user_id).await
        }

        async fn compare_and_set(&self, user_id: &str, expected: i64, new: i64) -> Result<bool, AppError> {
            self.points.compare_and_set(user_id, expected, new).await
        }
    }

    fn new_review() -> NewReview {
        NewReview {
            product_id: 1,
            user_id: "u1".into(),
            author_name: Some("Sari".into()),
            rating: 5,
            comment: None,
        }
    }

    fn review(rating: u8) -> Review {
        Review {
            id: rating as i64,
            product_id: 1,
            user_id: "u1".into(),
            author_name: None,
            rating,
            comment: None,
            created_at: None,
        }
    }

    fn completed_order(product_ids: &[i64]) -> Order {
        Order {
            id: 1,
            code: "DN-261019-0001".into(),
            user_id: "u1".into(),
            customer_name: "Sari".into(),
            phone: "6281234567890".into(),
            address: "Jl. Melati No. 7".into(),
            note: None,
            items: product_ids
                .iter()
                .map(|id| OrderItem {
                    product_id: *id,
                    name: format!("Donut {id}"),
                    quantity: 1,
                    unit_price: 10_000,
                })
                .collect(),
            total: 10_000 * product_ids.len() as i64,
            status: OrderStatus::Completed,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_rating_bounds() {
        for rating in [0, 6] {
            let request = ReviewRequest {
                rating,
                comment: None,
            };
            assert!(request.validate().is_err());
        }

        let request = ReviewRequest {
            rating: 5,
            comment: Some("   ".into()),
        };
        assert_eq!(request.validate().unwrap().comment, None);
    }

    #[test]
    fn test_comment_length() {
        let request = ReviewRequest {
            rating: 4,
            comment: Some("a".repeat(1001)),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_summary_average() {
        let summary = summarize(vec![review(5), review(4), review(4)]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average_rating, 4.3);

        assert_eq!(summarize(Vec::new()).average_rating, 0.0);
    }

    #[test]
    fn test_purchase_eligibility() {
        let orders = vec![completed_order(&[1, 2]), completed_order(&[5])];

        assert!(has_completed_purchase(&orders, 5));
        assert!(!has_completed_purchase(&orders, 3));
        assert!(!has_completed_purchase(&[], 1));
    }

    #[tokio::test]
    async fn test_credit_points() {
        let store = FakePoints::new(40, 0);

        assert_eq!(credit_points(&store, "u1", 10).await.unwrap(), 50);
        assert_eq!(*store.balance.lock().unwrap(), 50);
    }

    #[tokio::test]
    async fn test_credit_points_retries_on_race() {
        let store = FakePoints::new(40, 2);

        // Two lost races each bump the balance by one before we win.
        assert_eq!(credit_points(&store, "u1", 10).await.unwrap(), 52);
    }

    #[tokio::test]
    async fn test_credit_points_gives_up() {
        let store = FakePoints::new(40, CREDIT_ATTEMPTS);

        let result = credit_points(&store, "u1", 10).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_record_review_credits_once() {
        let shop = FakeShop {
            points: FakePoints::new(0, 0),
            reviews: Mutex::new(Vec::new()),
        };

        let first = record_review(&shop, &new_review(), 10).await.unwrap();
        assert_eq!(first.points_awarded, 10);
        assert_eq!(first.points_balance, Some(10));

        let second = record_review(&shop, &new_review(), 10).await;
        assert!(matches!(second, Err(AppError::Conflict(message)) if message == "You already reviewed this product"));

        assert_eq!(*shop.points.balance.lock().unwrap(), 10);
        assert_eq!(shop.reviews.lock().unwrap().len(), 1);
    }
}
