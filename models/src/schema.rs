table! {
    accounts (id) {
        id -> Int8,
        chat_id -> Nullable<Int8>,
        username -> Nullable<Text>,
        notify_chat_id -> Nullable<Int8>,
        token_salt -> Text,
        appdata -> Jsonb,
        created_at -> Int8,
    }
}

table! {
    groups (chat_id) {
        chat_id -> Int8,
        owner_id -> Nullable<Int8>,
        verbose -> Bool,
        ticket_price -> Int8,
    }
}

table! {
    transactions (id) {
        id -> Int8,
        created_at -> Int8,
        amount_msat -> Int8,
        payer_id -> Nullable<Int8>,
        payee_id -> Nullable<Int8>,
        description -> Nullable<Text>,
        payment_hash -> Nullable<Text>,
        preimage -> Nullable<Text>,
        label -> Nullable<Text>,
        fees_msat -> Int8,
        pending -> Bool,
        anonymous -> Bool,
        trigger_message -> Int8,
        remote_node -> Nullable<Text>,
    }
}

allow_tables_to_appear_in_same_query!(accounts, groups, transactions);
