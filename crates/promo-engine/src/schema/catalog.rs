//! 内置事件目录

use super::{EventCategory, EventKindDef, ParamDef};

pub(super) fn builtin_kinds() -> Vec<EventKindDef> {
    let mut kinds = Vec::new();
    kinds.extend(sportsbook());
    kinds.extend(crash_games());
    kinds.extend(wallet());
    kinds.extend(casino());
    kinds.extend(lifecycle());
    kinds
}

// ==================== 体育投注 ====================

fn sportsbook() -> Vec<EventKindDef> {
    use EventCategory::Sportsbook;

    vec![
        EventKindDef::new("bet_placement", "Bet Placement", Sportsbook)
            .amount("Stake")
            .param(ParamDef::float("Odds"))
            .param(ParamDef::enumeration(
                "Sport",
                &[
                    "Football",
                    "Basketball",
                    "Tennis",
                    "Ice Hockey",
                    "Rugby",
                    "Cricket",
                    "Any",
                ],
            ))
            .param(ParamDef::string("League"))
            .param(ParamDef::string("Market"))
            .param(ParamDef::integer("Selections Count"))
            .param(ParamDef::float("Potential Win")),
        EventKindDef::new("live_bet_placement", "Live Bet Placement", Sportsbook)
            .amount("Stake")
            .param(ParamDef::string("Current Score"))
            .param(ParamDef::integer("Match Minute"))
            .param(ParamDef::enumeration(
                "Sport",
                &["Football", "Tennis", "Basketball", "Table Tennis"],
            )),
        EventKindDef::new("bet_settled", "Bet Settled", Sportsbook)
            .param(ParamDef::enumeration(
                "Outcome",
                &["Win", "Loss", "Void", "Cashout", "Half-Win", "Half-Loss"],
            ))
            .param(ParamDef::integer("Losing Selections Count"))
            .param(ParamDef::integer("Winning Selections Count"))
            .param(ParamDef::integer("Voided Selections Count"))
            .param(ParamDef::float("Payout"))
            .param(ParamDef::float("Profit"))
            .param(ParamDef::float("Total Odds")),
        EventKindDef::new("acca_bet_settled", "Accumulator Settled", Sportsbook)
            .param(ParamDef::integer("Total Legs"))
            .param(ParamDef::integer("Losing Legs"))
            .param(ParamDef::float("Min Odds per Leg"))
            .param(ParamDef::enumeration("Outcome", &["Win", "Loss", "One-Cut"])),
        EventKindDef::new("cashout", "Cashout", Sportsbook)
            .param(ParamDef::enumeration(
                "Cashout Type",
                &["Full", "Partial", "Auto"],
            ))
            .amount("Amount")
            .param(ParamDef::float("Original Stake"))
            .param(ParamDef::float("Cashout %")),
    ]
}

// ==================== 快速游戏 ====================

fn crash_games() -> Vec<EventKindDef> {
    use EventCategory::CrashGame;

    vec![
        EventKindDef::new("aviator_bet", "Aviator Bet", CrashGame)
            .amount("Stake")
            .param(ParamDef::boolean("Auto Cashout Enabled"))
            .param(ParamDef::float("Auto Cashout Target")),
        EventKindDef::new("aviator_cashout", "Aviator Cashout", CrashGame)
            .param(ParamDef::float("Multiplier"))
            .amount("Win Amount")
            .param(ParamDef::float("Burst Multiplier")),
        EventKindDef::new("aviator_crash", "Aviator Crash", CrashGame)
            .amount("Stake Lost")
            .param(ParamDef::float("Crash Point")),
    ]
}

// ==================== 钱包 ====================

fn wallet() -> Vec<EventKindDef> {
    use EventCategory::Wallet;

    vec![
        EventKindDef::new("deposit", "Deposit", Wallet)
            .amount("Amount")
            .param(ParamDef::enumeration(
                "Method",
                &[
                    "Mpesa",
                    "AirtelMoney",
                    "Cashia",
                    "Card",
                    "BankTransfer",
                    "Voucher",
                ],
            ))
            .param(ParamDef::enumeration(
                "Currency",
                &["KES", "GHS", "NGN", "UGX", "ETB", "TZS", "MWK"],
            ))
            .param(ParamDef::boolean("Is First Deposit"))
            .param(ParamDef::string("Promo Code")),
        EventKindDef::new("first_deposit", "First Deposit", Wallet)
            .amount("Amount")
            .param(ParamDef::string("Method"))
            .param(ParamDef::integer("Days Since Reg")),
        EventKindDef::new("withdrawal", "Withdrawal Request", Wallet)
            .amount("Amount")
            .param(ParamDef::string("Method")),
        EventKindDef::new("withdrawal_completed", "Withdrawal Completed", Wallet)
            .amount("Amount"),
    ]
}

// ==================== 娱乐场 ====================

fn casino() -> Vec<EventKindDef> {
    use EventCategory::Casino;

    vec![
        EventKindDef::new("game_launch", "Game Launch", Casino)
            .param(ParamDef::string("Game ID"))
            .param(ParamDef::string("Provider"))
            .param(ParamDef::string("Category")),
        EventKindDef::new("spin", "Spin", Casino)
            .amount("Bet Amount")
            .param(ParamDef::enumeration(
                "Game Type",
                &["Slots", "Table", "Live Casino"],
            )),
        EventKindDef::new("game_win", "Game Win", Casino)
            .amount("Win Amount")
            .param(ParamDef::float("Multiplier")),
        EventKindDef::new("bonus_round", "Bonus Round Triggered", Casino)
            .param(ParamDef::string("Game ID")),
    ]
}

// ==================== 生命周期 ====================

fn lifecycle() -> Vec<EventKindDef> {
    use EventCategory::Lifecycle;

    vec![
        EventKindDef::new("registration", "Registration", Lifecycle)
            .param(ParamDef::enumeration("Reg Method", &["SMS", "Web", "App"]))
            .param(ParamDef::string("Referral Code")),
        EventKindDef::new("login", "Login", Lifecycle)
            .param(ParamDef::integer("Days Inactive"))
            .param(ParamDef::string("Platform")),
        EventKindDef::new("profile_update", "Profile Update / KYC", Lifecycle)
            .param(ParamDef::string("Doc Type")),
        EventKindDef::new("app_install", "App Install", Lifecycle)
            .param(ParamDef::enumeration("OS", &["Android", "iOS"])),
    ]
}
