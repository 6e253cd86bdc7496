mod coach;
mod price_point;

pub use coach::{
    CoachReplyRequest, CoachReplyResponse, CoachRequest, CoachResponse, CoachStyle,
    ConversationContext, Holding, PlayerLevel, ReplyResult, ReplySource, SelectedCoach,
    TradeAction, MAX_USER_MESSAGE_CHARS,
};
pub use price_point::{Period, PricePoint, PriceQuery, PriceSeriesResponse, SeriesSource};
